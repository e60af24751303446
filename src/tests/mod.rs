pub(crate) mod test_support;
pub(crate) mod wake_budget;
