#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: usize,

    /// 1-based
    pub page: usize,
    pub per_page: usize,
}
