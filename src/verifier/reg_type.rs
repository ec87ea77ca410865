use std::fmt;

/// Register types for category-1 integer constants
///
/// Each variant is the narrowest type that can hold a set of literal values, which lets the full
/// verifier accept eg. `const/4 v0, #1` as an initializer for a `boolean`. For non-negative
/// values, generality increases `Zero < One < PosByte < PosShort < Char < Integer`; for negative
/// values it increases `Byte < Short < Integer`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RegType {
    /// Exactly 0
    Zero,

    /// Exactly 1
    One,

    /// 2 to 127
    PosByte,

    /// -128 to -1
    Byte,

    /// 128 to 32767
    PosShort,

    /// -32768 to -129
    Short,

    /// 32768 to 65535
    Char,

    /// Anything else
    Integer,
}

impl RegType {
    /// Most restricted type that can hold a 32-bit constant
    pub fn from_cat1_const(value: i32) -> RegType {
        if value < -32768 {
            RegType::Integer
        } else if value < -128 {
            RegType::Short
        } else if value < 0 {
            RegType::Byte
        } else if value == 0 {
            RegType::Zero
        } else if value == 1 {
            RegType::One
        } else if value < 128 {
            RegType::PosByte
        } else if value < 32768 {
            RegType::PosShort
        } else if value < 65536 {
            RegType::Char
        } else {
            RegType::Integer
        }
    }
}

impl fmt::Display for RegType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegType::Zero => "zero",
            RegType::One => "one",
            RegType::PosByte => "posbyte",
            RegType::Byte => "byte",
            RegType::PosShort => "posshort",
            RegType::Short => "short",
            RegType::Char => "char",
            RegType::Integer => "integer",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod test {
    use super::RegType::{self, *};

    #[test]
    fn narrowest_types() {
        let expected = [
            (-40000, Integer),
            (-200, Short),
            (-1, Byte),
            (0, Zero),
            (1, One),
            (100, PosByte),
            (1000, PosShort),
            (40000, Char),
            (70000, Integer),
        ];
        for (value, reg_type) in expected {
            assert_eq!(RegType::from_cat1_const(value), reg_type, "value {}", value);
        }
    }

    #[test]
    fn boundaries() {
        let expected = [
            (i32::MIN, Integer),
            (-32769, Integer),
            (-32768, Short),
            (-129, Short),
            (-128, Byte),
            (2, PosByte),
            (127, PosByte),
            (128, PosShort),
            (32767, PosShort),
            (32768, Char),
            (65535, Char),
            (65536, Integer),
            (i32::MAX, Integer),
        ];
        for (value, reg_type) in expected {
            assert_eq!(RegType::from_cat1_const(value), reg_type, "value {}", value);
        }
    }
}
