use std::{
    fmt,
    fmt::{Debug, Display},
};

/// Wraps credentials so that they never end up in logs by accident. `Debug` and `Display` print `****`; use
/// [`Secret::reveal`] to get at the value and [`Secret::hint`] when an operator needs to tell keys apart.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl Secret<String> {
    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// The last four characters of the secret, prefixed with `****`. Short secrets are fully masked.
    pub fn hint(&self) -> String {
        let chars = self.value.chars().collect::<Vec<char>>();
        if chars.len() < 12 {
            return "****".to_string();
        }
        let tail = chars[chars.len() - 4..].iter().collect::<String>();
        format!("****{tail}")
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn never_prints_value() {
        let s = Secret::new("sk_test_51HxYzAbCdEf1234".to_string());
        assert_eq!(format!("{s}"), "****");
        assert_eq!(format!("{s:?}"), "****");
        assert_eq!(s.hint(), "****1234");
        assert_eq!(Secret::new("short".to_string()).hint(), "****");
    }
}
