use std::fmt::{Display, Formatter};

/// Configuration value with its type fixed at parse time. Coercion of
/// override strings is a total function over this closed set of tags instead
/// of runtime type introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfgValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl CfgValue {
    /// Tags a raw profile value: integers and the literals `True`/`False`
    /// become typed, everything else stays a string.
    pub fn parse(raw: &str) -> CfgValue {
        if let Ok(int) = raw.parse::<i64>() {
            return CfgValue::Int(int);
        }
        match raw {
            "True" => CfgValue::Bool(true),
            "False" => CfgValue::Bool(false),
            _ => CfgValue::Str(raw.to_string()),
        }
    }

    /// Coerces an override string to the tag of `self`. Booleans accept
    /// exactly the literal `True`; anything else is false.
    pub fn coerce(&self, raw: &str) -> Result<CfgValue, String> {
        match self {
            CfgValue::Str(_) => Ok(CfgValue::Str(raw.to_string())),
            CfgValue::Int(_) => raw
                .parse::<i64>()
                .map(CfgValue::Int)
                .map_err(|_| format!("expected integer, provided '{raw}'")),
            CfgValue::Bool(_) => Ok(CfgValue::Bool(raw == "True")),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CfgValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            CfgValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CfgValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl Display for CfgValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CfgValue::Str(value) => f.write_str(value),
            CfgValue::Int(value) => write!(f, "{value}"),
            CfgValue::Bool(true) => f.write_str("True"),
            CfgValue::Bool(false) => f.write_str("False"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::CfgValue;

    #[test]
    fn test_parse_tags() {
        assert_eq!(CfgValue::parse("4"), CfgValue::Int(4));
        assert_eq!(CfgValue::parse("-2"), CfgValue::Int(-2));
        assert_eq!(CfgValue::parse("True"), CfgValue::Bool(true));
        assert_eq!(CfgValue::parse("False"), CfgValue::Bool(false));
        assert_eq!(CfgValue::parse("2021.3"), CfgValue::Str("2021.3".to_string()));
    }

    #[test]
    fn test_coerce_preserves_tag() {
        assert_eq!(CfgValue::Int(2).coerce("4").unwrap(), CfgValue::Int(4));
        assert_eq!(
            CfgValue::Bool(false).coerce("True").unwrap(),
            CfgValue::Bool(true)
        );
        assert_eq!(
            CfgValue::Bool(true).coerce("no").unwrap(),
            CfgValue::Bool(false)
        );
        assert_eq!(
            CfgValue::Str("a".into()).coerce("17").unwrap(),
            CfgValue::Str("17".to_string())
        );
    }

    #[test]
    fn test_coerce_int_failure() {
        assert!(CfgValue::Int(2).coerce("four").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for raw in ["14", "True", "False", "skylake"] {
            assert_eq!(CfgValue::parse(raw).to_string(), raw);
        }
    }
}
