//! Search, sort and paginate over query result records.
//!
//! The free functions are the pure pipeline stages; [`TablePipeline`] is the
//! per-display session that holds [`PipelineState`] and answers intents.

use std::cmp::Ordering;
use std::fmt;

use icu_collator::{Collator, CollatorOptions, Strength};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_PAGE_SIZE: usize = 5;
const DEFAULT_PAGE_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Numbers, and text that parses as a finite number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite()),
        }
    }
}

/// Whole numbers go out as integers so JSON matches what the table displays.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(value) => match whole_number(*value) {
                Some(whole) => serializer.serialize_i64(whole),
                None => serializer.serialize_f64(*value),
            },
            Self::Text(text) => serializer.serialize_str(text),
        }
    }
}

// Only magnitudes an f64 holds exactly.
#[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
fn whole_number(value: f64) -> Option<i64> {
    const EXACT_LIMIT: f64 = 9_007_199_254_740_992.0;
    (value.is_finite() && value.trunc() == value && value.abs() <= EXACT_LIMIT)
        .then_some(value as i64)
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

/// One result row. Field order is the order columns were inserted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, CellValue)>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        let column = column.into();
        let value = value.into();
        if let Some(existing) = self.fields.iter_mut().find(|(name, _)| *name == column) {
            existing.1 = value;
        } else {
            self.fields.push((column, value));
        }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &CellValue> {
        self.fields.iter().map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn matches(&self, needle: &str) -> bool {
        self.values()
            .any(|value| value.to_string().to_lowercase().contains(needle))
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    None,
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortState {
    pub column: Option<String>,
    pub direction: SortDirection,
}

impl SortState {
    /// Header click: the same column cycles none, ascending, descending and
    /// back to none (which clears the column); another column starts
    /// ascending.
    pub fn request(&mut self, column: &str) {
        match self.column.as_deref() {
            Some(current) if current == column => {
                self.direction = match self.direction {
                    SortDirection::None => SortDirection::Ascending,
                    SortDirection::Ascending => SortDirection::Descending,
                    SortDirection::Descending => SortDirection::None,
                };
                if self.direction == SortDirection::None {
                    self.column = None;
                }
            }
            _ => {
                self.column = Some(column.to_string());
                self.direction = SortDirection::Ascending;
            }
        }
    }

    #[must_use]
    pub fn active(&self) -> Option<(&str, SortDirection)> {
        match (&self.column, self.direction) {
            (Some(column), SortDirection::Ascending | SortDirection::Descending) => {
                Some((column.as_str(), self.direction))
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn direction_for(&self, column: &str) -> SortDirection {
        match self.active() {
            Some((active, direction)) if active == column => direction,
            _ => SortDirection::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub searchable: bool,
    pub sortable: bool,
    pub paginated: bool,
    pub page_size: usize,
    pub page_window: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            searchable: true,
            sortable: true,
            paginated: true,
            page_size: DEFAULT_PAGE_SIZE,
            page_window: DEFAULT_PAGE_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    pub search_term: String,
    pub sort: SortState,
    pub current_page: usize,
    pub page_size: usize,
}

impl PipelineState {
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            search_term: String::new(),
            sort: SortState::default(),
            current_page: 1,
            page_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("page size must be greater than 0")]
    ZeroPageSize,
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
}

/// Column names of the record set, taken from the first record.
#[must_use]
pub fn schema_of(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|record| record.columns().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Keeps records where any field contains `term`, ignoring case. An empty
/// term keeps everything in input order.
#[must_use]
pub fn filter_records<'a>(records: &'a [Record], term: &str) -> Vec<&'a Record> {
    matching_indices(records, term)
        .into_iter()
        .map(|index| &records[index])
        .collect()
}

/// How a column compares when sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// A column is numeric when every present value across the whole record set
/// is a number. Decided before filtering so a search never flips the order of
/// two rows it keeps.
#[must_use]
pub fn column_kind(records: &[Record], column: &str) -> ColumnKind {
    if records
        .iter()
        .filter_map(|record| record.get(column))
        .all(|value| value.as_number().is_some())
    {
        ColumnKind::Numeric
    } else {
        ColumnKind::Text
    }
}

/// Stable sort by `column`, compared as `kind`. `SortDirection::None`
/// returns the input order.
#[must_use]
pub fn sort_records<'a>(
    rows: Vec<&'a Record>,
    column: &str,
    kind: ColumnKind,
    direction: SortDirection,
) -> Vec<&'a Record> {
    let mut order = (0..rows.len()).collect::<Vec<_>>();
    sort_order(&mut order, |index| rows[index].get(column), kind, direction);
    order.into_iter().map(|index| rows[index]).collect()
}

#[must_use]
pub fn total_pages(count: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    count.div_ceil(page_size)
}

#[must_use]
pub fn clamp_page(page: usize, count: usize, page_size: usize) -> usize {
    page.clamp(1, total_pages(count, page_size).max(1))
}

/// Rows `[(page-1)*size, page*size)` after clamping `page` into range.
#[must_use]
pub fn paginate<T>(rows: &[T], page: usize, page_size: usize) -> &[T] {
    if page_size == 0 {
        return &[];
    }
    let page = clamp_page(page, rows.len(), page_size);
    let start = ((page - 1) * page_size).min(rows.len());
    let end = (start + page_size).min(rows.len());
    &rows[start..end]
}

/// 1-based `(first, last)` item numbers shown on `page`, `(0, 0)` when empty.
#[must_use]
pub fn display_window(count: usize, page: usize, page_size: usize) -> (usize, usize) {
    if count == 0 || page_size == 0 {
        return (0, 0);
    }
    let page = clamp_page(page, count, page_size);
    let start = (page - 1) * page_size + 1;
    (start, (page * page_size).min(count))
}

/// Page numbers to render as buttons, at most `window` of them.
#[must_use]
pub fn page_window(current: usize, total: usize, window: usize) -> Vec<usize> {
    if total == 0 || window == 0 {
        return Vec::new();
    }
    if total <= window {
        return (1..=total).collect();
    }

    let current = current.clamp(1, total);
    let below = window / 2;
    let above = window - below;
    let first = if current <= below + 1 {
        1
    } else if current + above - 1 >= total {
        total - window + 1
    } else {
        current - below
    };
    (first..first + window).collect()
}

/// Header text for a record key: `firstName` and `first_name` both become
/// `First Name`.
#[must_use]
pub fn column_label(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for character in key.chars() {
        if character == '_' || character == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if character.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(character);
        } else {
            current.push(character);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut characters = word.chars();
            match characters.next() {
                Some(first) => first.to_uppercase().chain(characters).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn matching_indices(records: &[Record], term: &str) -> Vec<usize> {
    if term.is_empty() {
        return (0..records.len()).collect();
    }
    let needle = term.to_lowercase();
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.matches(&needle))
        .map(|(index, _)| index)
        .collect()
}

#[derive(Debug)]
enum SortKey {
    Number(f64),
    Text(String),
}

/// Root locale at secondary strength: accents count, case does not.
fn text_collator() -> Option<Collator> {
    let mut options = CollatorOptions::new();
    options.strength = Some(Strength::Secondary);
    match Collator::try_new(&Default::default(), options) {
        Ok(collator) => Some(collator),
        Err(error) => {
            warn!(%error, "collator unavailable, text sorts by lowercase code points");
            None
        }
    }
}

fn compare_text(collator: Option<&Collator>, left: &str, right: &str) -> Ordering {
    match collator {
        Some(collator) => collator.compare(left, right),
        None => left.to_lowercase().cmp(&right.to_lowercase()),
    }
}

fn compare_keys(
    collator: Option<&Collator>,
    left: Option<&SortKey>,
    right: Option<&SortKey>,
) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(SortKey::Number(left)), Some(SortKey::Number(right))) => left.total_cmp(right),
        (Some(SortKey::Text(left)), Some(SortKey::Text(right))) => {
            compare_text(collator, left, right)
        }
        (Some(SortKey::Number(_)), Some(SortKey::Text(_))) => Ordering::Less,
        (Some(SortKey::Text(_)), Some(SortKey::Number(_))) => Ordering::Greater,
    }
}

/// Reorders `order` (positions into some row set) by the value `cell` yields
/// for each position. Absent cells sort first when ascending.
fn sort_order<'a>(
    order: &mut [usize],
    cell: impl Fn(usize) -> Option<&'a CellValue>,
    kind: ColumnKind,
    direction: SortDirection,
) {
    if direction == SortDirection::None || order.len() < 2 {
        return;
    }

    let keys = order
        .iter()
        .map(|&index| {
            cell(index).map(|value| match (kind, value.as_number()) {
                (ColumnKind::Numeric, Some(number)) => SortKey::Number(number),
                _ => SortKey::Text(value.to_string()),
            })
        })
        .collect::<Vec<_>>();
    let collator = match kind {
        ColumnKind::Text => text_collator(),
        ColumnKind::Numeric => None,
    };

    let mut positions = (0..order.len()).collect::<Vec<_>>();
    positions.sort_by(|&left, &right| {
        let ordering = compare_keys(collator.as_ref(), keys[left].as_ref(), keys[right].as_ref());
        if direction == SortDirection::Descending {
            ordering.reverse()
        } else {
            ordering
        }
    });

    let sorted = positions.into_iter().map(|position| order[position]).collect::<Vec<_>>();
    order.copy_from_slice(&sorted);
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableView<'a> {
    pub headers: &'a [String],
    pub rows: Vec<&'a Record>,
    pub total_count: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub start_item: usize,
    pub end_item: usize,
    pub page_window: Vec<usize>,
    pub sort: &'a SortState,
    pub search_term: &'a str,
}

impl TableView<'_> {
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Showing {} to {} of {} results",
            self.start_item, self.end_item, self.total_count
        )
    }

    #[must_use]
    pub fn cells(&self, row: &Record) -> Vec<String> {
        self.headers
            .iter()
            .map(|header| row.get(header).map(ToString::to_string).unwrap_or_default())
            .collect()
    }
}

/// A record set plus the display state the presentation layer mutates.
///
/// The filtered-and-sorted order is kept as row indices and rebuilt only when
/// the search term or the sort changes.
#[derive(Debug, Clone)]
pub struct TablePipeline {
    records: Vec<Record>,
    headers: Vec<String>,
    kinds: Vec<ColumnKind>,
    config: TableConfig,
    state: PipelineState,
    ordered: Vec<usize>,
}

impl TablePipeline {
    pub fn new(records: Vec<Record>, config: TableConfig) -> Result<Self, TableError> {
        if config.page_size == 0 {
            return Err(TableError::ZeroPageSize);
        }
        let headers = schema_of(&records);
        let kinds = headers
            .iter()
            .map(|header| column_kind(&records, header))
            .collect();
        let ordered = (0..records.len()).collect();
        Ok(Self {
            records,
            headers,
            kinds,
            config,
            state: PipelineState::new(config.page_size),
            ordered,
        })
    }

    #[must_use]
    pub fn config(&self) -> TableConfig {
        self.config
    }

    #[must_use]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Every filtered row in display order, ignoring pagination.
    pub fn ordered_records(&self) -> impl Iterator<Item = &Record> {
        self.ordered.iter().map(|&index| &self.records[index])
    }

    #[must_use]
    pub fn filtered_count(&self) -> usize {
        self.ordered.len()
    }

    pub fn set_search(&mut self, text: &str) {
        if !self.config.searchable {
            debug!("search ignored, table is not searchable");
            return;
        }
        self.state.search_term = text.to_string();
        self.state.current_page = 1;
        self.rebuild_order();
        debug!(
            term = text,
            matches = self.ordered.len(),
            "search term applied"
        );
    }

    pub fn request_sort(&mut self, column: &str) -> Result<(), TableError> {
        if !self.config.sortable {
            debug!(column, "sort ignored, table is not sortable");
            return Ok(());
        }
        if !self.headers.iter().any(|header| header == column) {
            warn!(column, "sort requested for unknown column");
            return Err(TableError::UnknownColumn(column.to_string()));
        }
        self.state.sort.request(column);
        self.rebuild_order();
        debug!(
            column,
            direction = ?self.state.sort.direction,
            "sort state changed"
        );
        Ok(())
    }

    pub fn set_page(&mut self, page: usize) {
        self.state.current_page = clamp_page(page, self.ordered.len(), self.state.page_size);
    }

    pub fn next_page(&mut self) {
        self.set_page(self.state.current_page.saturating_add(1));
    }

    pub fn previous_page(&mut self) {
        self.set_page(self.state.current_page.saturating_sub(1));
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), TableError> {
        if page_size == 0 {
            return Err(TableError::ZeroPageSize);
        }
        self.state.page_size = page_size;
        self.state.current_page = 1;
        Ok(())
    }

    #[must_use]
    pub fn view(&self) -> TableView<'_> {
        let total_count = self.ordered.len();
        let (page_size, total_pages, current_page) = if self.config.paginated {
            let size = self.state.page_size;
            (
                size,
                total_pages(total_count, size),
                clamp_page(self.state.current_page, total_count, size),
            )
        } else {
            (total_count.max(1), usize::from(total_count > 0), 1)
        };

        let rows = paginate(&self.ordered, current_page, page_size)
            .iter()
            .map(|&index| &self.records[index])
            .collect();
        let (start_item, end_item) = display_window(total_count, current_page, page_size);

        TableView {
            headers: &self.headers,
            rows,
            total_count,
            total_pages,
            current_page,
            start_item,
            end_item,
            page_window: page_window(current_page, total_pages, self.config.page_window),
            sort: &self.state.sort,
            search_term: &self.state.search_term,
        }
    }

    /// Kind of a header, fixed when the pipeline was built.
    #[must_use]
    pub fn column_kind(&self, column: &str) -> Option<ColumnKind> {
        self.headers
            .iter()
            .position(|header| header == column)
            .map(|position| self.kinds[position])
    }

    fn rebuild_order(&mut self) {
        let mut ordered = matching_indices(&self.records, &self.state.search_term);
        if let Some((column, direction)) = self.state.sort.active() {
            let kind = self.column_kind(column).unwrap_or(ColumnKind::Text);
            let records = &self.records;
            sort_order(&mut ordered, |index| records[index].get(column), kind, direction);
        }
        self.ordered = ordered;
    }
}

#[cfg(test)]
mod tests {
    use super::{
        column_kind, column_label, display_window, filter_records, page_window, paginate,
        sort_records, total_pages, CellValue, ColumnKind, Record, SortDirection, SortState,
        TableConfig, TableError, TablePipeline,
    };

    const NAMES: [&str; 10] = [
        "John Doe",
        "Jane Smith",
        "Bob Johnson",
        "Alice Brown",
        "Charlie Wilson",
        "Diana Prince",
        "Edward Norton",
        "Fiona Green",
        "George Miller",
        "Hannah Lee",
    ];

    fn people() -> Vec<Record> {
        NAMES
            .iter()
            .zip(1_i32..)
            .map(|(name, id)| {
                Record::new()
                    .with("id", id)
                    .with("name", *name)
                    .with("score", id * 3)
            })
            .collect()
    }

    fn names(rows: &[&Record]) -> Vec<String> {
        rows.iter()
            .map(|row| row.get("name").map(ToString::to_string).unwrap_or_default())
            .collect()
    }

    #[test]
    fn empty_search_is_identity() {
        let records = people();
        let filtered = filter_records(&records, "");
        assert_eq!(filtered.len(), records.len());
        assert!(filtered
            .iter()
            .zip(records.iter())
            .all(|(left, right)| std::ptr::eq(*left, right)));
    }

    #[test]
    fn search_is_case_insensitive_subset() {
        let records = people();
        let filtered = filter_records(&records, "JOHN");
        assert_eq!(names(&filtered), vec!["John Doe", "Bob Johnson"]);

        let by_number = filter_records(&records, "10");
        assert_eq!(names(&by_number), vec!["Hannah Lee"]);
    }

    #[test]
    fn descending_reverses_ascending_and_none_restores_filter_order() {
        let records = people();
        let filtered = filter_records(&records, "");

        let by_name =
            |direction| sort_records(filtered.clone(), "name", ColumnKind::Text, direction);
        let ascending = by_name(SortDirection::Ascending);
        let mut descending = by_name(SortDirection::Descending);
        descending.reverse();
        assert_eq!(names(&ascending), names(&descending));
        assert_eq!(names(&ascending)[0], "Alice Brown");

        let unsorted = by_name(SortDirection::None);
        assert_eq!(names(&unsorted), names(&filtered));
    }

    #[test]
    fn numeric_columns_sort_numerically() {
        let records = vec![
            Record::new().with("amount", "10"),
            Record::new().with("amount", 9),
            Record::new().with("amount", "100"),
        ];
        assert_eq!(column_kind(&records, "amount"), ColumnKind::Numeric);
        let rows = filter_records(&records, "");
        let sorted = sort_records(rows, "amount", ColumnKind::Numeric, SortDirection::Ascending);
        let amounts = sorted
            .iter()
            .map(|row| row.get("amount").map(ToString::to_string).unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(amounts, vec!["9", "10", "100"]);
    }

    #[test]
    fn search_keeps_the_column_kind_of_the_full_record_set() {
        let records = vec![
            Record::new().with("code", "10").with("team", "red"),
            Record::new().with("code", "9").with("team", "red"),
            Record::new().with("code", "abc").with("team", "blue"),
        ];
        let mut table =
            TablePipeline::new(records, TableConfig::default()).expect("pipeline should build");
        assert_eq!(table.column_kind("code"), Some(ColumnKind::Text));
        table.request_sort("code").expect("code is a column");
        let codes = |table: &TablePipeline| {
            table
                .ordered_records()
                .map(|row| row.get("code").map(ToString::to_string).unwrap_or_default())
                .collect::<Vec<_>>()
        };
        assert_eq!(codes(&table), vec!["10", "9", "abc"]);

        table.set_search("red");
        assert_eq!(codes(&table), vec!["10", "9"]);
    }

    #[test]
    fn text_sorts_by_locale_collation() {
        let records = ["Zoe", "Émile", "adam", "eve"]
            .into_iter()
            .map(|name| Record::new().with("name", name))
            .collect::<Vec<_>>();
        let ascending = sort_records(
            filter_records(&records, ""),
            "name",
            ColumnKind::Text,
            SortDirection::Ascending,
        );
        assert_eq!(names(&ascending), vec!["adam", "Émile", "eve", "Zoe"]);

        let descending = sort_records(
            filter_records(&records, ""),
            "name",
            ColumnKind::Text,
            SortDirection::Descending,
        );
        assert_eq!(names(&descending), vec!["Zoe", "eve", "Émile", "adam"]);
    }

    #[test]
    fn sort_is_stable_for_ties() {
        let records = vec![
            Record::new().with("team", "b").with("who", "first"),
            Record::new().with("team", "A").with("who", "second"),
            Record::new().with("team", "B").with("who", "third"),
            Record::new().with("team", "a").with("who", "fourth"),
        ];
        let sorted = sort_records(
            filter_records(&records, ""),
            "team",
            ColumnKind::Text,
            SortDirection::Ascending,
        );
        let who = sorted
            .iter()
            .map(|row| row.get("who").map(ToString::to_string).unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(who, vec!["second", "fourth", "first", "third"]);
    }

    #[test]
    fn missing_fields_are_absent_not_errors() {
        let records = vec![
            Record::new().with("name", "zed").with("city", "Oslo"),
            Record::new().with("name", "amy"),
        ];
        assert_eq!(filter_records(&records, "oslo").len(), 1);

        let sorted = sort_records(
            filter_records(&records, ""),
            "city",
            column_kind(&records, "city"),
            SortDirection::Ascending,
        );
        assert_eq!(names(&sorted), vec!["amy", "zed"]);
    }

    #[test]
    fn pages_concatenate_back_to_the_sorted_set() {
        let records = people();
        let sorted = sort_records(
            filter_records(&records, ""),
            "name",
            ColumnKind::Text,
            SortDirection::Ascending,
        );
        let pages = total_pages(sorted.len(), 3);
        assert_eq!(pages, 4);

        let rebuilt = (1..=pages)
            .flat_map(|page| paginate(&sorted, page, 3).iter().copied())
            .collect::<Vec<_>>();
        assert_eq!(names(&rebuilt), names(&sorted));
        assert_eq!(paginate(&sorted, 4, 3).len(), 1);
    }

    #[test]
    fn out_of_range_pages_are_clamped() {
        let rows = (1..=7).collect::<Vec<_>>();
        assert_eq!(paginate(&rows, 0, 5), &[1, 2, 3, 4, 5]);
        assert_eq!(paginate(&rows, 9, 5), &[6, 7]);
        assert!(paginate::<i32>(&[], 3, 5).is_empty());
        assert_eq!(display_window(7, 9, 5), (6, 7));
        assert_eq!(display_window(0, 1, 5), (0, 0));
    }

    #[test]
    fn sort_state_cycles_per_column() {
        let mut sort = SortState::default();
        sort.request("name");
        assert_eq!(sort.active(), Some(("name", SortDirection::Ascending)));
        sort.request("name");
        assert_eq!(sort.active(), Some(("name", SortDirection::Descending)));
        sort.request("name");
        assert_eq!(sort, SortState::default());

        sort.request("name");
        sort.request("name");
        sort.request("email");
        assert_eq!(sort.active(), Some(("email", SortDirection::Ascending)));
        assert_eq!(sort.direction_for("name"), SortDirection::None);
    }

    #[test]
    fn page_window_slides_with_the_current_page() {
        assert_eq!(page_window(2, 3, 5), vec![1, 2, 3]);
        assert_eq!(page_window(1, 10, 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(page_window(3, 10, 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(page_window(4, 10, 5), vec![2, 3, 4, 5, 6]);
        assert_eq!(page_window(7, 10, 5), vec![5, 6, 7, 8, 9]);
        assert_eq!(page_window(8, 10, 5), vec![6, 7, 8, 9, 10]);
        assert_eq!(page_window(10, 10, 5), vec![6, 7, 8, 9, 10]);
        assert_eq!(page_window(5, 10, 4), vec![3, 4, 5, 6]);
        assert!(page_window(1, 0, 5).is_empty());
    }

    #[test]
    fn search_sort_and_first_page_scenario() {
        let mut table = TablePipeline::new(people(), TableConfig::default())
            .expect("pipeline should build");
        table.set_search("o");
        table.request_sort("name").expect("name is a column");

        let view = table.view();
        let expected = {
            let mut matching = NAMES
                .iter()
                .filter(|name| name.to_lowercase().contains('o'))
                .map(|name| (*name).to_string())
                .collect::<Vec<_>>();
            matching.sort_by_key(|name| name.to_lowercase());
            matching
        };
        assert_eq!(view.total_count, expected.len());
        assert_eq!(names(&view.rows), expected[..5].to_vec());
        assert!(names(&view.rows).contains(&"Bob Johnson".to_string()));
        assert_eq!(
            view.summary(),
            format!("Showing 1 to 5 of {} results", expected.len())
        );
        assert!(table
            .ordered_records()
            .any(|row| row.get("name") == Some(&CellValue::from("George Miller"))));
    }

    #[test]
    fn new_search_resets_to_the_first_page() {
        let mut table = TablePipeline::new(people(), TableConfig::default())
            .expect("pipeline should build");
        table.set_page(2);
        assert_eq!(table.view().current_page, 2);

        table.set_search("e");
        assert_eq!(table.state().current_page, 1);

        table.set_page(2);
        table.set_page_size(3).expect("page size should apply");
        assert_eq!(table.state().current_page, 1);
        assert_eq!(table.set_page_size(0), Err(TableError::ZeroPageSize));
    }

    #[test]
    fn page_navigation_stays_in_range() {
        let mut table = TablePipeline::new(people(), TableConfig::default())
            .expect("pipeline should build");
        table.previous_page();
        assert_eq!(table.state().current_page, 1);
        table.next_page();
        table.next_page();
        table.next_page();
        assert_eq!(table.state().current_page, 2);

        let view = table.view();
        assert_eq!(view.total_pages, 2);
        assert_eq!((view.start_item, view.end_item), (6, 10));
        assert_eq!(view.page_window, vec![1, 2]);
    }

    #[test]
    fn configuration_flags_disable_intents() {
        let config = TableConfig {
            searchable: false,
            sortable: false,
            paginated: false,
            ..TableConfig::default()
        };
        let mut table = TablePipeline::new(people(), config).expect("pipeline should build");
        table.set_search("bob");
        table.request_sort("name").expect("disabled sort is a no-op");

        let view = table.view();
        assert_eq!(view.rows.len(), 10);
        assert_eq!(view.total_pages, 1);
        assert_eq!(view.summary(), "Showing 1 to 10 of 10 results");
        assert_eq!(names(&view.rows)[0], "John Doe");
    }

    #[test]
    fn unknown_sort_column_is_rejected() {
        let mut table = TablePipeline::new(people(), TableConfig::default())
            .expect("pipeline should build");
        assert_eq!(
            table.request_sort("salary"),
            Err(TableError::UnknownColumn("salary".to_string()))
        );
        assert_eq!(table.state().sort, SortState::default());
    }

    #[test]
    fn empty_record_sets_produce_an_empty_view() {
        let mut table =
            TablePipeline::new(Vec::new(), TableConfig::default()).expect("pipeline should build");
        table.set_page(4);
        let view = table.view();
        assert!(view.headers.is_empty());
        assert!(view.rows.is_empty());
        assert_eq!(view.total_pages, 0);
        assert_eq!(view.current_page, 1);
        assert_eq!(view.summary(), "Showing 0 to 0 of 0 results");
        assert!(view.page_window.is_empty());
    }

    #[test]
    fn stale_page_is_clamped_after_the_filter_shrinks() {
        let mut table = TablePipeline::new(people(), TableConfig::default())
            .expect("pipeline should build");
        table.set_page(2);
        table.state.search_term = "george".to_string();
        table.rebuild_order();

        let view = table.view();
        assert_eq!(view.current_page, 1);
        assert_eq!(names(&view.rows), vec!["George Miller"]);
    }

    #[test]
    fn zero_page_size_config_is_rejected() {
        let config = TableConfig {
            page_size: 0,
            ..TableConfig::default()
        };
        assert!(matches!(
            TablePipeline::new(people(), config),
            Err(TableError::ZeroPageSize)
        ));
    }

    #[test]
    fn column_labels_split_words() {
        assert_eq!(column_label("firstName"), "First Name");
        assert_eq!(column_label("first_name"), "First Name");
        assert_eq!(column_label("id"), "Id");
    }

    #[test]
    fn records_serialize_in_column_order() {
        let record = Record::new()
            .with("zeta", 1)
            .with("alpha", "x")
            .with("ratio", 2.5);
        let rendered = serde_json::to_string(&record).expect("record should serialize");
        assert_eq!(rendered, r#"{"zeta":1,"alpha":"x","ratio":2.5}"#);
    }
}
