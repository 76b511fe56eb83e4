//! TaskKind - dispatch 可能な task の閉じた列挙
//!
//! task 名の文字列比較を 1 箇所（`parse`）に閉じ込め、以降は `match` の網羅性で
//! 追加漏れをコンパイル時に検出します。

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Download providers, normalize their specs and fetch resources.
    Fetch,
    /// Evaluate a policy against previously fetched data.
    Policy,
}

impl TaskKind {
    /// すべての TaskKind
    pub const ALL: [TaskKind; 2] = [TaskKind::Fetch, TaskKind::Policy];

    /// wire 上の名前と完全一致（大文字小文字を区別）
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "fetch" => Some(Self::Fetch),
            "policy" => Some(Self::Policy),
            _ => None,
        }
    }

    /// wire 上の名前（`"fetch"`, `"policy"`）
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Policy => "policy",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("fetch", Some(TaskKind::Fetch))]
    #[case("policy", Some(TaskKind::Policy))]
    #[case("Fetch", None)]
    #[case(" fetch", None)]
    #[case("", None)]
    #[case("init", None)]
    fn parse_accepts_only_exact_names(#[case] name: &str, #[case] expected: Option<TaskKind>) {
        assert_eq!(TaskKind::parse(name), expected);
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for kind in TaskKind::ALL {
            assert_eq!(TaskKind::parse(&kind.to_string()), Some(kind));
        }
    }
}
