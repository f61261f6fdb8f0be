pub mod export;
pub mod mock;

#[must_use]
pub fn adapter_name() -> &'static str {
    "askdb-adapters"
}

#[cfg(test)]
mod tests {
    use super::adapter_name;

    #[test]
    fn adapter_name_is_stable() {
        assert_eq!(adapter_name(), "askdb-adapters");
    }
}
