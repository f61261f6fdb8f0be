use std::fs;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use askdb_adapters::export::{export_selection_to_json, export_view_to_csv, export_view_to_json};
use askdb_adapters::mock::{
    initial_column_selection, initial_data_sources, MockAssistant, MockSchemaBackend,
    LEDGER_DATABASE,
};
use askdb_core::config::DashboardConfig;
use askdb_core::saved_queries::{
    suggested_page_path, FileSavedQueriesStore, SavedQueriesError, SavedQuery,
};
use askdb_core::schema_discovery::{SchemaCatalog, SchemaDiscovery};
use askdb_core::selection_tree::{Group, SelectionError, SelectionTree, TriState};
use askdb_core::session::{Authenticator, SessionContext};
use askdb_core::tabular::{column_label, SortDirection, TablePipeline, TableView};
use askdb_core::transcript::{ChatMessage, ResponsePayload, Role, Transcript};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::{Frame, Terminal};
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tracing::{info, warn};

const TICK_RATE: Duration = Duration::from_millis(120);
const MAX_COLUMN_WIDTH: usize = 24;
const CSV_EXPORT_FILE: &str = "askdb-results.csv";
const JSON_EXPORT_FILE: &str = "askdb-results.json";
const SCHEMA_EXPORT_FILE: &str = "askdb-schema.json";

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    SavedQueries(#[from] SavedQueriesError),
}

/// What the binary hands the dashboard at startup.
#[derive(Debug, Clone)]
pub struct TuiOptions {
    pub config: DashboardConfig,
    pub saved_queries_path: PathBuf,
    pub export_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    SignIn,
    Chat,
    Results,
    SchemaSetup,
}

impl Pane {
    fn next(self) -> Self {
        match self {
            Self::SignIn => Self::SignIn,
            Self::Chat => Self::Results,
            Self::Results => Self::SchemaSetup,
            Self::SchemaSetup => Self::Chat,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::SignIn => "Sign In",
            Self::Chat => "Chat",
            Self::Results => "Results",
            Self::SchemaSetup => "Schema Setup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditTarget {
    Email,
    Password,
    Prompt,
    Search,
    Annotation,
    SaveTitle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectionKey {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Msg {
    Quit,
    ToggleHelp,
    NextPane,
    NextField,
    Submit,
    Cancel,
    Navigate(DirectionKey),
    Toggle,
    Expand,
    StartPrompt,
    StartSearch,
    Annotate,
    SaveQuery,
    SortColumn,
    NextPage,
    PreviousPage,
    Export,
    OpenDataSources,
    RefreshSchema,
    SignOut,
    InputChar(char),
    Backspace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TreeRow {
    Group(usize),
    Leaf(usize, usize),
}

/// Cursor-driven working copy of a [`SelectionTree`]. Collapsed groups hide
/// their leaves from the cursor.
#[derive(Debug, Clone)]
struct SelectionEditor {
    tree: SelectionTree,
    cursor: usize,
    group_noun: &'static str,
    leaf_noun: &'static str,
}

impl SelectionEditor {
    fn new(tree: SelectionTree, group_noun: &'static str, leaf_noun: &'static str) -> Self {
        Self {
            tree,
            cursor: 0,
            group_noun,
            leaf_noun,
        }
    }

    fn rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        for (group_index, group) in self.tree.groups().iter().enumerate() {
            rows.push(TreeRow::Group(group_index));
            if group.expanded {
                rows.extend((0..group.leaves.len()).map(|leaf| TreeRow::Leaf(group_index, leaf)));
            }
        }
        rows
    }

    fn move_cursor(&mut self, direction: DirectionKey) {
        let last = self.rows().len().saturating_sub(1);
        self.cursor = match direction {
            DirectionKey::Up | DirectionKey::Left => self.cursor.saturating_sub(1),
            DirectionKey::Down | DirectionKey::Right => (self.cursor + 1).min(last),
        };
    }

    fn row_at_cursor(&self) -> Option<TreeRow> {
        self.rows().get(self.cursor).copied()
    }

    /// Group name and, on a leaf row, the leaf name under the cursor.
    fn names_at_cursor(&self) -> Option<(String, Option<String>)> {
        let groups = self.tree.groups();
        match self.row_at_cursor()? {
            TreeRow::Group(group) => Some((groups[group].name.clone(), None)),
            TreeRow::Leaf(group, leaf) => Some((
                groups[group].name.clone(),
                Some(groups[group].leaves[leaf].name.clone()),
            )),
        }
    }

    fn toggle(&mut self) -> Result<Option<(String, bool)>, SelectionError> {
        match self.names_at_cursor() {
            Some((group, Some(leaf))) => {
                let selected = self.tree.toggle_leaf(&group, &leaf)?;
                Ok(Some((format!("{group}.{leaf}"), selected)))
            }
            Some((group, None)) => {
                let selected = self.tree.toggle_group(&group)?;
                Ok(Some((group, selected)))
            }
            None => Ok(None),
        }
    }

    fn toggle_expansion(&mut self) -> Result<(), SelectionError> {
        let Some(row) = self.row_at_cursor() else {
            return Ok(());
        };
        let group_index = match row {
            TreeRow::Group(group) | TreeRow::Leaf(group, _) => group,
        };
        let name = self.tree.groups()[group_index].name.clone();
        self.tree.toggle_expansion(&name)?;
        self.cursor = self
            .rows()
            .iter()
            .position(|row| *row == TreeRow::Group(group_index))
            .unwrap_or(0);
        Ok(())
    }

    fn leaf_at_cursor(&self) -> Option<(String, String, Option<String>)> {
        match self.row_at_cursor()? {
            TreeRow::Leaf(group, leaf) => {
                let group = &self.tree.groups()[group];
                let leaf = &group.leaves[leaf];
                Some((group.name.clone(), leaf.name.clone(), leaf.annotation.clone()))
            }
            TreeRow::Group(_) => None,
        }
    }

    fn summary(&self) -> String {
        self.tree
            .counts()
            .describe(self.group_noun, self.leaf_noun)
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let groups = self.tree.groups();
        self.rows()
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                let cursor = if index == self.cursor { ">" } else { " " };
                match row {
                    TreeRow::Group(group_index) => {
                        let group = &groups[group_index];
                        let state = self
                            .tree
                            .group_state(&group.name)
                            .unwrap_or(TriState::Unchecked);
                        let (selected, total) =
                            self.tree.group_progress(&group.name).unwrap_or((0, 0));
                        let arrow = if group.expanded { "v" } else { ">" };
                        Line::from(format!(
                            "{cursor} {arrow} {} {} ({selected}/{total} {}s)",
                            tri_state_marker(state),
                            group.name,
                            self.leaf_noun
                        ))
                    }
                    TreeRow::Leaf(group_index, leaf_index) => {
                        let group = &groups[group_index];
                        let leaf = &group.leaves[leaf_index];
                        let marker = if leaf.selected { "[x]" } else { "[ ]" };
                        let mut text = format!("{cursor}     {marker} {}", leaf.name);
                        if let Some(data_type) = &leaf.data_type {
                            text.push_str(&format!("  {data_type}"));
                        }
                        if let Some(annotation) = leaf.annotation.as_deref() {
                            if !annotation.is_empty() {
                                text.push_str(&format!("  # {annotation}"));
                            }
                        }
                        let style = if group.selected {
                            Style::default()
                        } else {
                            Style::default().fg(Color::DarkGray)
                        };
                        Line::styled(text, style)
                    }
                }
            })
            .collect()
    }
}

fn tri_state_marker(state: TriState) -> &'static str {
    match state {
        TriState::Checked => "[x]",
        TriState::Unchecked => "[ ]",
        TriState::Partial => "[-]",
    }
}

fn direction_arrow(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::None => "",
        SortDirection::Ascending => " ^",
        SortDirection::Descending => " v",
    }
}

#[derive(Debug)]
struct TuiApp {
    runtime: Runtime,
    config: DashboardConfig,
    authenticator: Authenticator,
    session: Option<SessionContext>,
    pane: Pane,
    editing: Option<EditTarget>,
    email: String,
    password: String,
    input: String,
    schema: SchemaDiscovery<MockSchemaBackend>,
    data_sources: SelectionTree,
    data_sources_modal: Option<SelectionEditor>,
    schema_setup: Option<SelectionEditor>,
    configured_columns: Option<Vec<Group>>,
    transcript: Transcript,
    assistant: MockAssistant,
    last_prompt: Option<String>,
    table: Option<TablePipeline>,
    sort_column: usize,
    feature_on_homepage: bool,
    saved_queries: FileSavedQueriesStore,
    export_dir: PathBuf,
    show_help: bool,
    should_quit: bool,
    status_line: String,
}

impl TuiApp {
    fn new(options: TuiOptions) -> Result<Self, TuiError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let saved_queries = FileSavedQueriesStore::load_from_path(options.saved_queries_path)?;
        let schema = SchemaDiscovery::new(MockSchemaBackend::new(), options.config.schema.ttl());

        let mut app = Self {
            runtime,
            authenticator: Authenticator::new(options.config.auth.clone()),
            config: options.config,
            session: None,
            pane: Pane::SignIn,
            editing: Some(EditTarget::Email),
            email: String::new(),
            password: String::new(),
            input: String::new(),
            schema,
            data_sources: SelectionTree::default(),
            data_sources_modal: None,
            schema_setup: None,
            configured_columns: None,
            transcript: Transcript::default(),
            assistant: MockAssistant::new(),
            last_prompt: None,
            table: None,
            sort_column: 0,
            feature_on_homepage: false,
            saved_queries,
            export_dir: options.export_dir,
            show_help: false,
            should_quit: false,
            status_line: "Sign in to start querying".to_string(),
        };
        app.load_schema();
        Ok(app)
    }

    fn load_schema(&mut self) {
        match self.runtime.block_on(self.schema.catalog()) {
            Ok(catalog) => {
                match initial_data_sources(&catalog) {
                    Ok(tree) => self.data_sources = tree,
                    Err(error) => self.status_line = format!("Data sources unavailable: {error}"),
                }
                self.reset_schema_setup(&catalog);
            }
            Err(error) => {
                warn!(%error, "schema discovery failed");
                self.status_line = format!("Schema discovery failed: {error}");
            }
        }
    }

    fn refresh_schema(&mut self) {
        match self.runtime.block_on(self.schema.refresh()) {
            Ok(catalog) => {
                self.reset_schema_setup(&catalog);
                self.configured_columns = None;
                self.status_line = "Schema refreshed".to_string();
            }
            Err(error) => self.status_line = format!("Schema refresh failed: {error}"),
        }
    }

    fn reset_schema_setup(&mut self, catalog: &SchemaCatalog) {
        self.schema_setup = catalog
            .database(LEDGER_DATABASE)
            .and_then(|database| initial_column_selection(database).ok())
            .map(|tree| SelectionEditor::new(tree, "table", "column"));
    }

    fn handle(&mut self, msg: Msg) {
        if let Some(target) = self.editing {
            self.handle_editing(target, msg);
            return;
        }
        if self.data_sources_modal.is_some() {
            self.handle_modal(msg);
            return;
        }

        match msg {
            Msg::Quit => self.should_quit = true,
            Msg::ToggleHelp => self.show_help = !self.show_help,
            Msg::NextPane => {
                self.pane = self.pane.next();
                self.status_line = format!("Switched pane to {}", self.pane.title());
            }
            Msg::Submit => self.submit(),
            Msg::Cancel => self.cancel(),
            Msg::Navigate(direction) => self.navigate(direction),
            Msg::Toggle => self.toggle_selection(),
            Msg::Expand => self.toggle_expansion(),
            Msg::StartPrompt => {
                if self.pane == Pane::Chat {
                    self.start_editing(EditTarget::Prompt, String::new());
                }
            }
            Msg::StartSearch => self.start_search(),
            Msg::Annotate => self.start_annotation(),
            Msg::SaveQuery => self.start_save_query(),
            Msg::SortColumn => self.sort_selected_column(),
            Msg::NextPage => {
                if let Some(table) = self.table.as_mut() {
                    table.next_page();
                }
            }
            Msg::PreviousPage => {
                if let Some(table) = self.table.as_mut() {
                    table.previous_page();
                }
            }
            Msg::Export => self.export(),
            Msg::OpenDataSources => self.open_data_sources(),
            Msg::RefreshSchema => {
                if self.pane == Pane::SchemaSetup {
                    self.refresh_schema();
                }
            }
            Msg::SignOut => self.sign_out(),
            Msg::NextField | Msg::InputChar(_) | Msg::Backspace => {}
        }
    }

    fn handle_editing(&mut self, target: EditTarget, msg: Msg) {
        match msg {
            Msg::Quit => self.should_quit = true,
            Msg::InputChar(character) => {
                self.buffer_mut(target).push(character);
                if target == EditTarget::Search {
                    self.apply_search();
                }
            }
            Msg::Backspace => {
                self.buffer_mut(target).pop();
                if target == EditTarget::Search {
                    self.apply_search();
                }
            }
            Msg::NextField => match target {
                EditTarget::Email => self.editing = Some(EditTarget::Password),
                EditTarget::Password => self.editing = Some(EditTarget::Email),
                EditTarget::SaveTitle => {
                    self.feature_on_homepage = !self.feature_on_homepage;
                }
                EditTarget::Prompt | EditTarget::Search | EditTarget::Annotation => {}
            },
            Msg::Submit => self.finish_editing(target),
            Msg::Cancel => self.cancel_editing(target),
            _ => {}
        }
    }

    fn handle_modal(&mut self, msg: Msg) {
        match msg {
            Msg::Quit => self.should_quit = true,
            Msg::ToggleHelp => self.show_help = !self.show_help,
            Msg::Navigate(direction) => {
                if let Some(editor) = self.data_sources_modal.as_mut() {
                    editor.move_cursor(direction);
                }
            }
            Msg::Toggle => self.toggle_selection(),
            Msg::Expand => self.toggle_expansion(),
            Msg::Submit => self.commit_data_sources(),
            Msg::Cancel => {
                self.data_sources_modal = None;
                self.status_line = "Data source changes discarded".to_string();
            }
            _ => {}
        }
    }

    fn buffer_mut(&mut self, target: EditTarget) -> &mut String {
        match target {
            EditTarget::Email => &mut self.email,
            EditTarget::Password => &mut self.password,
            EditTarget::Prompt
            | EditTarget::Search
            | EditTarget::Annotation
            | EditTarget::SaveTitle => &mut self.input,
        }
    }

    fn start_editing(&mut self, target: EditTarget, initial: String) {
        self.input = initial;
        self.editing = Some(target);
    }

    fn finish_editing(&mut self, target: EditTarget) {
        match target {
            EditTarget::Email => self.editing = Some(EditTarget::Password),
            EditTarget::Password => self.sign_in(),
            EditTarget::Prompt => self.send_prompt(),
            EditTarget::Search => {
                self.editing = None;
                self.input.clear();
            }
            EditTarget::Annotation => self.apply_annotation(),
            EditTarget::SaveTitle => self.save_query(),
        }
    }

    fn cancel_editing(&mut self, target: EditTarget) {
        match target {
            EditTarget::Email | EditTarget::Password => {
                self.email.clear();
                self.password.clear();
                self.editing = Some(EditTarget::Email);
            }
            EditTarget::Search => {
                self.input.clear();
                self.apply_search();
                self.editing = None;
            }
            EditTarget::Prompt | EditTarget::Annotation | EditTarget::SaveTitle => {
                self.input.clear();
                self.editing = None;
            }
        }
    }

    fn sign_in(&mut self) {
        match self.authenticator.sign_in(&self.email, &self.password) {
            Ok(session) => {
                self.status_line = format!("Signed in as {}", session.display_name());
                self.session = Some(session);
                self.password.clear();
                self.editing = None;
                self.pane = Pane::Chat;
            }
            Err(error) => {
                self.status_line = error.to_string();
                self.password.clear();
                self.editing = Some(EditTarget::Password);
            }
        }
    }

    fn sign_out(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.sign_out();
        }
        self.transcript = Transcript::default();
        self.table = None;
        self.last_prompt = None;
        self.pane = Pane::SignIn;
        self.editing = Some(EditTarget::Email);
        self.status_line = "Signed out".to_string();
    }

    fn send_prompt(&mut self) {
        let prompt = std::mem::take(&mut self.input);
        self.editing = None;
        let Some(session) = self.session.as_ref() else {
            self.status_line = "Sign in first".to_string();
            return;
        };

        let scope = self.data_sources.in_scope();
        let sent = self.runtime.block_on(self.transcript.send(
            session,
            &prompt,
            &scope,
            &self.assistant,
        ));
        match sent {
            Ok(Some(reply)) => {
                let payload = reply.payload.clone();
                self.last_prompt = Some(prompt.trim().to_string());
                self.apply_payload(payload);
            }
            Ok(None) => self.status_line = "Type a question first".to_string(),
            Err(error) => {
                warn!(%error, "prompt failed");
                self.status_line = error.to_string();
            }
        }
    }

    fn apply_payload(&mut self, payload: Option<ResponsePayload>) {
        self.status_line = match payload {
            Some(ResponsePayload::Table(records)) => {
                let row_count = records.len();
                match TablePipeline::new(records, self.config.table) {
                    Ok(table) => {
                        self.table = Some(table);
                        self.sort_column = 0;
                        format!("Loaded {row_count} rows, Tab to Results")
                    }
                    Err(error) => format!("Cannot display table: {error}"),
                }
            }
            Some(ResponsePayload::Chart(points)) => format!("Chart with {} points", points.len()),
            Some(ResponsePayload::Metrics(metrics)) => format!("{} metrics", metrics.len()),
            None => "Assistant replied".to_string(),
        };
    }

    fn submit(&mut self) {
        match self.pane {
            Pane::SignIn => self.editing = Some(EditTarget::Email),
            Pane::Chat => self.start_editing(EditTarget::Prompt, String::new()),
            Pane::Results => self.sort_selected_column(),
            Pane::SchemaSetup => self.save_schema_setup(),
        }
    }

    fn cancel(&mut self) {
        if self.pane == Pane::Results {
            if let Some(table) = self.table.as_mut() {
                if !table.state().search_term.is_empty() {
                    table.set_search("");
                    self.status_line = "Search cleared".to_string();
                }
            }
        }
    }

    fn navigate(&mut self, direction: DirectionKey) {
        match self.pane {
            Pane::SignIn | Pane::Chat => {}
            Pane::Results => {
                let Some(table) = &self.table else {
                    return;
                };
                let last = table.headers().len().saturating_sub(1);
                match direction {
                    DirectionKey::Left => self.sort_column = self.sort_column.saturating_sub(1),
                    DirectionKey::Right => self.sort_column = (self.sort_column + 1).min(last),
                    DirectionKey::Up => {
                        if let Some(table) = self.table.as_mut() {
                            table.previous_page();
                        }
                    }
                    DirectionKey::Down => {
                        if let Some(table) = self.table.as_mut() {
                            table.next_page();
                        }
                    }
                }
            }
            Pane::SchemaSetup => {
                if let Some(editor) = self.schema_setup.as_mut() {
                    editor.move_cursor(direction);
                }
            }
        }
    }

    fn active_editor(&mut self) -> Option<&mut SelectionEditor> {
        if self.data_sources_modal.is_some() {
            self.data_sources_modal.as_mut()
        } else if self.pane == Pane::SchemaSetup {
            self.schema_setup.as_mut()
        } else {
            None
        }
    }

    fn toggle_selection(&mut self) {
        let Some(editor) = self.active_editor() else {
            return;
        };
        let status = match editor.toggle() {
            Ok(Some((name, selected))) => format!(
                "{} {name}, {}",
                if selected { "Selected" } else { "Deselected" },
                editor.summary()
            ),
            Ok(None) => "Nothing to toggle".to_string(),
            Err(error) => format!("Toggle failed: {error}"),
        };
        self.status_line = status;
    }

    fn toggle_expansion(&mut self) {
        let Some(editor) = self.active_editor() else {
            return;
        };
        if let Err(error) = editor.toggle_expansion() {
            self.status_line = format!("Expand failed: {error}");
        }
    }

    fn open_data_sources(&mut self) {
        if self.session.is_none() {
            return;
        }
        self.data_sources_modal = Some(SelectionEditor::new(
            self.data_sources.clone(),
            "database",
            "table",
        ));
        self.status_line = "Space toggles, e expands, Enter applies, Esc discards".to_string();
    }

    fn commit_data_sources(&mut self) {
        let Some(editor) = self.data_sources_modal.take() else {
            return;
        };
        match SelectionTree::new(editor.tree.commit()) {
            Ok(tree) => {
                self.data_sources = tree;
                self.status_line = self.data_sources.scope_summary();
            }
            Err(error) => self.status_line = format!("Data sources rejected: {error}"),
        }
    }

    fn save_schema_setup(&mut self) {
        let Some(editor) = &self.schema_setup else {
            self.status_line = "No schema discovered yet".to_string();
            return;
        };
        let summary = editor.summary();
        self.configured_columns = Some(editor.tree.clone().commit());
        self.status_line = format!("Configuration saved: {summary}");
    }

    fn start_annotation(&mut self) {
        if self.pane != Pane::SchemaSetup {
            return;
        }
        let Some((_, leaf, annotation)) = self
            .schema_setup
            .as_ref()
            .and_then(SelectionEditor::leaf_at_cursor)
        else {
            self.status_line = "Move to a column to describe it".to_string();
            return;
        };
        self.status_line = format!("Describing column `{leaf}`");
        self.start_editing(EditTarget::Annotation, annotation.unwrap_or_default());
    }

    fn apply_annotation(&mut self) {
        let text = std::mem::take(&mut self.input);
        self.editing = None;
        let Some(editor) = self.schema_setup.as_mut() else {
            return;
        };
        let Some((group, leaf, _)) = editor.leaf_at_cursor() else {
            return;
        };
        self.status_line = match editor.tree.set_leaf_annotation(&group, &leaf, text.trim()) {
            Ok(()) => format!("Described {group}.{leaf}"),
            Err(error) => format!("Description failed: {error}"),
        };
    }

    fn start_search(&mut self) {
        if self.pane != Pane::Results {
            return;
        }
        let Some(table) = &self.table else {
            self.status_line = "No table to search".to_string();
            return;
        };
        if !table.config().searchable {
            self.status_line = "Search is disabled for this table".to_string();
            return;
        }
        let term = table.state().search_term.clone();
        self.start_editing(EditTarget::Search, term);
    }

    fn apply_search(&mut self) {
        if let Some(table) = self.table.as_mut() {
            table.set_search(&self.input);
        }
    }

    fn sort_selected_column(&mut self) {
        let Some(table) = self.table.as_mut() else {
            return;
        };
        let Some(column) = table.headers().get(self.sort_column).cloned() else {
            return;
        };
        self.status_line = match table.request_sort(&column) {
            Ok(()) => match table.state().sort.direction_for(&column) {
                SortDirection::None => "Sort cleared".to_string(),
                direction => format!("Sorted by {} {direction:?}", column_label(&column)),
            },
            Err(error) => format!("Sort failed: {error}"),
        };
    }

    fn start_save_query(&mut self) {
        if self.last_prompt.is_none() {
            self.status_line = "Ask a question before saving it".to_string();
            return;
        }
        self.feature_on_homepage = false;
        self.start_editing(EditTarget::SaveTitle, String::new());
    }

    fn save_query(&mut self) {
        let title = std::mem::take(&mut self.input);
        let query = match SavedQuery::new(
            &title,
            &suggested_page_path(&title),
            self.feature_on_homepage,
        ) {
            Ok(query) => query,
            Err(error) => {
                self.status_line = format!("Cannot save query: {error}");
                self.input = title;
                return;
            }
        };
        let query = match &self.last_prompt {
            Some(prompt) => query.with_prompt(prompt.clone()),
            None => query,
        };
        self.editing = None;

        let page_path = query.page_path.clone();
        self.saved_queries.upsert_query(query);
        self.status_line = match self.saved_queries.persist() {
            Ok(()) => format!("Saved query at {page_path}"),
            Err(error) => format!("Saved query not persisted: {error}"),
        };
    }

    fn export(&mut self) {
        if let Err(error) = fs::create_dir_all(&self.export_dir) {
            self.status_line = format!("Export failed: {error}");
            return;
        }

        self.status_line = match (self.pane, &self.configured_columns, &self.table) {
            (Pane::SchemaSetup, Some(groups), _) => {
                let path = self.export_dir.join(SCHEMA_EXPORT_FILE);
                match export_selection_to_json(&path, groups) {
                    Ok(()) => format!("Exported configuration to {}", path.display()),
                    Err(error) => format!("Export failed: {error}"),
                }
            }
            (Pane::SchemaSetup, None, _) => "Save the configuration first (Enter)".to_string(),
            (_, _, Some(table)) => {
                let csv_path = self.export_dir.join(CSV_EXPORT_FILE);
                let json_path = self.export_dir.join(JSON_EXPORT_FILE);
                match export_view_to_csv(&csv_path, table)
                    .and_then(|rows| export_view_to_json(&json_path, table).map(|_| rows))
                {
                    Ok(rows) => format!("Exported {rows} rows to {}", self.export_dir.display()),
                    Err(error) => format!("Export failed: {error}"),
                }
            }
            (_, _, None) => "No table to export".to_string(),
        };
    }

    fn header_spans(&self) -> Vec<Span<'static>> {
        let user = self
            .session
            .as_ref()
            .map_or_else(|| "signed out".to_string(), |session| session.email().to_string());
        let mut spans = vec![
            Span::styled(
                format!(" Pane: {} ", self.pane.title()),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" | "),
            Span::raw(format!("User: {user}")),
        ];
        if self.session.is_some() {
            spans.push(Span::raw(" | "));
            spans.push(Span::raw(self.data_sources.scope_summary()));
            spans.push(Span::raw(" | "));
            spans.push(Span::raw(format!(
                "Saved queries: {}",
                self.saved_queries.queries().len()
            )));
        }
        spans
    }

    fn footer_hint(&self) -> &'static str {
        if self.data_sources_modal.is_some() {
            return "arrows: move | space: toggle | e: expand | Enter: apply | Esc: discard";
        }
        match (self.editing, self.pane) {
            (Some(EditTarget::Email | EditTarget::Password), _) => {
                "Tab: switch field | Enter: next / sign in | Esc: clear"
            }
            (Some(EditTarget::SaveTitle), _) => {
                "Enter: save | Tab: toggle homepage feature | Esc: cancel"
            }
            (Some(_), _) => "Enter: confirm | Esc: cancel",
            (None, Pane::SignIn) => "Enter: edit credentials",
            (None, Pane::Chat) => "i/Enter: ask | d: data sources | w: save query | o: sign out",
            (None, Pane::Results) => {
                "/: search | h/l: column | s/Enter: sort | n/p: page | x: export | w: save"
            }
            (None, Pane::SchemaSetup) => {
                "space: toggle | e: expand | a: describe | Enter: save | r: refresh | x: export"
            }
        }
    }
}

#[must_use]
pub fn ui_name() -> &'static str {
    "askdb-tui"
}

pub fn run(options: TuiOptions) -> Result<(), TuiError> {
    let app = TuiApp::new(options)?;
    let mut terminal = setup_terminal()?;
    let run_result = run_loop(&mut terminal, app);
    let restore_result = restore_terminal(&mut terminal);

    if let Err(error) = run_result {
        restore_result?;
        return Err(error);
    }

    restore_result?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), TuiError> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut app: TuiApp,
) -> Result<(), TuiError> {
    info!("dashboard started");
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| render(frame, &app))?;

        let timeout = TICK_RATE
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(message) = map_key_event(key, app.editing.is_some()) {
                        app.handle(message);
                    }
                }
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }

    info!("dashboard closed");
    Ok(())
}

fn render(frame: &mut Frame<'_>, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let header = Paragraph::new(Line::from(app.header_spans()))
        .block(Block::default().borders(Borders::ALL).title("askdb"));
    frame.render_widget(header, chunks[0]);

    let body_height = usize::from(chunks[1].height.saturating_sub(2));
    let body_text = match app.pane {
        Pane::SignIn => sign_in_lines(app),
        Pane::Chat => chat_lines(app, body_height),
        Pane::Results => results_lines(app),
        Pane::SchemaSetup => schema_setup_lines(app),
    };
    let body = Paragraph::new(body_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(app.pane.title()),
        )
        .alignment(Alignment::Left);
    frame.render_widget(body, chunks[1]);

    let footer = Paragraph::new(vec![
        Line::from(app.footer_hint()),
        Line::from(format!("Status: {}", app.status_line)),
    ])
    .block(Block::default().borders(Borders::ALL).title("Keys"));
    frame.render_widget(footer, chunks[2]);

    if let Some(editor) = &app.data_sources_modal {
        render_data_sources_modal(frame, editor);
    }
    if app.show_help {
        render_help_popup(frame);
    }
}

fn edit_marker(app: &TuiApp, target: EditTarget) -> &'static str {
    if app.editing == Some(target) {
        "_"
    } else {
        ""
    }
}

fn sign_in_lines(app: &TuiApp) -> Vec<Line<'static>> {
    vec![
        Line::from("Sign in to your account"),
        Line::from(""),
        Line::from(format!(
            "Email:    {}{}",
            app.email,
            edit_marker(app, EditTarget::Email)
        )),
        Line::from(format!(
            "Password: {}{}",
            "*".repeat(app.password.chars().count()),
            edit_marker(app, EditTarget::Password)
        )),
        Line::from(""),
        Line::styled(
            format!(
                "Demo account: {} / {}",
                app.config.auth.demo_email, app.config.auth.demo_password
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ]
}

fn message_lines(message: &ChatMessage) -> Vec<Line<'static>> {
    let (speaker, style) = match message.role {
        Role::User => ("You", Style::default().fg(Color::Cyan)),
        Role::Assistant => ("Assistant", Style::default().fg(Color::Green)),
    };
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{speaker}: "), style.add_modifier(Modifier::BOLD)),
        Span::raw(message.content.clone()),
    ])];

    match &message.payload {
        Some(ResponsePayload::Table(records)) => {
            lines.push(Line::from(format!(
                "  [table] {} rows, open Results to browse",
                records.len()
            )));
        }
        Some(ResponsePayload::Chart(points)) => {
            for point in points {
                let series = point
                    .series
                    .iter()
                    .map(|(name, value)| format!("{name} {value}"))
                    .collect::<Vec<_>>()
                    .join("  ");
                lines.push(Line::from(format!("  {:<4} {series}", point.label)));
            }
        }
        Some(ResponsePayload::Metrics(metrics)) => {
            for metric in metrics {
                lines.push(Line::from(format!("  {}: {}", metric.label, metric.value)));
            }
        }
        None => {}
    }
    lines
}

fn chat_lines(app: &TuiApp, height: usize) -> Vec<Line<'static>> {
    let mut lines = app
        .transcript
        .messages()
        .iter()
        .flat_map(message_lines)
        .collect::<Vec<_>>();
    lines.push(Line::from(""));
    let prompt = if app.editing == Some(EditTarget::Prompt) {
        format!("> {}_", app.input)
    } else {
        "> (press i to ask a question)".to_string()
    };
    lines.push(Line::styled(
        prompt,
        Style::default().add_modifier(Modifier::BOLD),
    ));

    if app.editing == Some(EditTarget::SaveTitle) {
        lines.push(Line::from(format!(
            "Save as: {}_  (feature on homepage: {})",
            app.input,
            if app.feature_on_homepage { "yes" } else { "no" }
        )));
    }

    let skip = lines.len().saturating_sub(height.max(1));
    lines.into_iter().skip(skip).collect()
}

fn column_widths(view: &TableView<'_>) -> Vec<usize> {
    view.headers
        .iter()
        .map(|header| {
            view.rows
                .iter()
                .map(|row| row.get(header).map_or(0, |value| value.to_string().chars().count()))
                .chain(std::iter::once(column_label(header).chars().count() + 2))
                .max()
                .unwrap_or(0)
                .min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

fn pad(text: &str, width: usize) -> String {
    let truncated = text.chars().take(width).collect::<String>();
    format!("{truncated:<width$}")
}

fn results_lines(app: &TuiApp) -> Vec<Line<'static>> {
    let Some(table) = &app.table else {
        return vec![Line::from("No results yet. Ask a question in Chat.")];
    };
    let view = table.view();
    let widths = column_widths(&view);

    let mut lines = Vec::new();
    let search = if app.editing == Some(EditTarget::Search) {
        format!("Search: {}_", app.input)
    } else if view.search_term.is_empty() {
        "Search: (press / to filter)".to_string()
    } else {
        format!("Search: {}", view.search_term)
    };
    lines.push(Line::from(search));
    lines.push(Line::from(""));

    let header_spans = view
        .headers
        .iter()
        .zip(&widths)
        .enumerate()
        .map(|(index, (header, width))| {
            let label = format!(
                "{}{}",
                column_label(header),
                direction_arrow(view.sort.direction_for(header))
            );
            let style = if index == app.sort_column {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };
            Span::styled(format!("{} ", pad(&label, *width)), style)
        })
        .collect::<Vec<_>>();
    lines.push(Line::from(header_spans));

    if view.rows.is_empty() {
        lines.push(Line::from("No matching rows"));
    }
    for row in &view.rows {
        let cells = view
            .cells(row)
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(Line::from(cells));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(view.summary()));
    if view.total_pages > 1 {
        let pages = view
            .page_window
            .iter()
            .map(|page| {
                if *page == view.current_page {
                    format!("[{page}]")
                } else {
                    page.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(Line::from(format!(
            "Page {} of {}: < {pages} >",
            view.current_page, view.total_pages
        )));
    }
    lines
}

fn schema_setup_lines(app: &TuiApp) -> Vec<Line<'static>> {
    let Some(editor) = &app.schema_setup else {
        return vec![Line::from("No schema discovered. Press r to retry.")];
    };
    let mut lines = vec![
        Line::from(format!("Connected to {LEDGER_DATABASE}: choose what the assistant may read")),
        Line::from(format!("Selected: {}", editor.summary())),
        Line::from(""),
    ];
    lines.extend(editor.lines());
    if app.editing == Some(EditTarget::Annotation) {
        lines.push(Line::from(""));
        lines.push(Line::from(format!("Description: {}_", app.input)));
    }
    lines
}

fn render_data_sources_modal(frame: &mut Frame<'_>, editor: &SelectionEditor) {
    let area = centered_rect(60, 70, frame.area());
    frame.render_widget(Clear, area);
    let mut lines = vec![
        Line::from(format!("Query has access to {}", editor.summary())),
        Line::from(""),
    ];
    lines.extend(editor.lines());
    let modal = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Data Sources"),
    );
    frame.render_widget(modal, area);
}

fn render_help_popup(frame: &mut Frame<'_>) {
    let area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, area);
    let help = Paragraph::new(vec![
        Line::from("Global keymap"),
        Line::from("q / Ctrl+C: quit"),
        Line::from("?: toggle help"),
        Line::from("Tab: cycle panes"),
        Line::from("d: pick data sources"),
        Line::from("i: ask a question"),
        Line::from("/: search results, s: sort column, n/p: page"),
        Line::from("space / e / a: toggle, expand, describe in schema setup"),
        Line::from("w: save query, x: export, o: sign out"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(help, area);
}

fn centered_rect(width_percent: u16, height_percent: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100_u16 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100_u16 - height_percent) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100_u16 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100_u16 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

fn map_key_event(key: KeyEvent, editing: bool) -> Option<Msg> {
    if editing {
        return match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(Msg::Quit),
            (_, KeyCode::Enter) => Some(Msg::Submit),
            (_, KeyCode::Esc) => Some(Msg::Cancel),
            (_, KeyCode::Tab) => Some(Msg::NextField),
            (_, KeyCode::Backspace) => Some(Msg::Backspace),
            (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(character)) => {
                Some(Msg::InputChar(character))
            }
            _ => None,
        };
    }

    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) | (_, KeyCode::Char('q')) => Some(Msg::Quit),
        (_, KeyCode::Char('?')) => Some(Msg::ToggleHelp),
        (_, KeyCode::Tab) => Some(Msg::NextPane),
        (_, KeyCode::Enter) => Some(Msg::Submit),
        (_, KeyCode::Esc) => Some(Msg::Cancel),
        (_, KeyCode::Up | KeyCode::Char('k')) => Some(Msg::Navigate(DirectionKey::Up)),
        (_, KeyCode::Down | KeyCode::Char('j')) => Some(Msg::Navigate(DirectionKey::Down)),
        (_, KeyCode::Left | KeyCode::Char('h')) => Some(Msg::Navigate(DirectionKey::Left)),
        (_, KeyCode::Right | KeyCode::Char('l')) => Some(Msg::Navigate(DirectionKey::Right)),
        (_, KeyCode::Char(' ')) => Some(Msg::Toggle),
        (_, KeyCode::Char('e')) => Some(Msg::Expand),
        (_, KeyCode::Char('i')) => Some(Msg::StartPrompt),
        (_, KeyCode::Char('/')) => Some(Msg::StartSearch),
        (_, KeyCode::Char('a')) => Some(Msg::Annotate),
        (_, KeyCode::Char('w')) => Some(Msg::SaveQuery),
        (_, KeyCode::Char('s')) => Some(Msg::SortColumn),
        (_, KeyCode::Char('n')) => Some(Msg::NextPage),
        (_, KeyCode::Char('p')) => Some(Msg::PreviousPage),
        (_, KeyCode::Char('x')) => Some(Msg::Export),
        (_, KeyCode::Char('d')) => Some(Msg::OpenDataSources),
        (_, KeyCode::Char('r')) => Some(Msg::RefreshSchema),
        (_, KeyCode::Char('o')) => Some(Msg::SignOut),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use askdb_core::config::DashboardConfig;
    use askdb_core::saved_queries::FileSavedQueriesStore;
    use askdb_core::selection_tree::SelectionCounts;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use tempfile::TempDir;

    use super::{map_key_event, DirectionKey, EditTarget, Msg, Pane, TuiApp, TuiOptions};

    fn test_app(temp_dir: &TempDir) -> TuiApp {
        TuiApp::new(TuiOptions {
            config: DashboardConfig::default(),
            saved_queries_path: temp_dir.path().join("saved_queries.toml"),
            export_dir: temp_dir.path().join("exports"),
        })
        .expect("app should start")
    }

    fn type_text(app: &mut TuiApp, text: &str) {
        for character in text.chars() {
            app.handle(Msg::InputChar(character));
        }
    }

    fn signed_in_app(temp_dir: &TempDir) -> TuiApp {
        let mut app = test_app(temp_dir);
        type_text(&mut app, "johndoe@gmail.com");
        app.handle(Msg::Submit);
        type_text(&mut app, "12121212");
        app.handle(Msg::Submit);
        assert_eq!(app.pane, Pane::Chat);
        app
    }

    fn ask(app: &mut TuiApp, prompt: &str) {
        app.handle(Msg::StartPrompt);
        type_text(app, prompt);
        app.handle(Msg::Submit);
    }

    #[test]
    fn pane_cycles_in_expected_order() {
        assert_eq!(Pane::Chat.next(), Pane::Results);
        assert_eq!(Pane::Results.next(), Pane::SchemaSetup);
        assert_eq!(Pane::SchemaSetup.next(), Pane::Chat);
        assert_eq!(Pane::SignIn.next(), Pane::SignIn);
    }

    #[test]
    fn keymap_supports_required_global_keys() {
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE), false),
            Some(Msg::Quit)
        ));
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE), false),
            Some(Msg::NextPane)
        ));
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE), false),
            Some(Msg::Toggle)
        ));
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE), false),
            Some(Msg::Navigate(DirectionKey::Down))
        ));
    }

    #[test]
    fn editing_keymap_captures_text() {
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE), true),
            Some(Msg::InputChar('q'))
        ));
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::Char('J'), KeyModifiers::SHIFT), true),
            Some(Msg::InputChar('J'))
        ));
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), true),
            Some(Msg::Quit)
        ));
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE), true),
            Some(Msg::Cancel)
        ));
    }

    #[test]
    fn wrong_password_keeps_the_sign_in_pane() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = test_app(&temp_dir);
        type_text(&mut app, "johndoe@gmail.com");
        app.handle(Msg::Submit);
        type_text(&mut app, "nope");
        app.handle(Msg::Submit);

        assert_eq!(app.pane, Pane::SignIn);
        assert!(app.session.is_none());
        assert_eq!(app.editing, Some(EditTarget::Password));
        assert!(app.password.is_empty());
    }

    #[test]
    fn data_sources_modal_discards_on_cancel_and_applies_on_enter() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = signed_in_app(&temp_dir);
        let initial = SelectionCounts {
            groups: 1,
            leaves: 3,
        };
        assert_eq!(app.data_sources.counts(), initial);

        app.handle(Msg::OpenDataSources);
        for _ in 0..5 {
            app.handle(Msg::Navigate(DirectionKey::Down));
        }
        app.handle(Msg::Toggle);
        app.handle(Msg::Cancel);
        assert!(app.data_sources_modal.is_none());
        assert_eq!(app.data_sources.counts(), initial);

        app.handle(Msg::OpenDataSources);
        for _ in 0..5 {
            app.handle(Msg::Navigate(DirectionKey::Down));
        }
        app.handle(Msg::Toggle);
        app.handle(Msg::Submit);
        assert_eq!(
            app.data_sources.counts(),
            SelectionCounts {
                groups: 2,
                leaves: 6
            }
        );
        assert!(app
            .data_sources
            .is_leaf_effective("analytics_db", "page_views")
            .expect("known table"));
    }

    #[test]
    fn chat_reply_feeds_the_results_pipeline() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = signed_in_app(&temp_dir);
        ask(&mut app, "show me all users");

        assert_eq!(app.transcript.messages().len(), 3);
        let table = app.table.as_ref().expect("first reply is a table");
        assert_eq!(table.filtered_count(), 10);

        app.handle(Msg::NextPane);
        assert_eq!(app.pane, Pane::Results);
        app.handle(Msg::StartSearch);
        type_text(&mut app, "jo");
        assert_eq!(app.table.as_ref().map(|table| table.filtered_count()), Some(2));
        app.handle(Msg::Submit);
        assert_eq!(app.editing, None);

        app.handle(Msg::Cancel);
        assert_eq!(app.table.as_ref().map(|table| table.filtered_count()), Some(10));
    }

    #[test]
    fn sorting_and_paging_follow_the_selected_column() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = signed_in_app(&temp_dir);
        ask(&mut app, "show me all users");
        app.handle(Msg::NextPane);

        app.handle(Msg::Navigate(DirectionKey::Right));
        app.handle(Msg::SortColumn);
        let view = app.table.as_ref().expect("table loaded").view();
        assert_eq!(
            view.rows[0].get("name").map(ToString::to_string).as_deref(),
            Some("Alice Brown")
        );
        assert_eq!(view.summary(), "Showing 1 to 5 of 10 results");

        app.handle(Msg::NextPage);
        let view = app.table.as_ref().expect("table loaded").view();
        assert_eq!(view.current_page, 2);
        assert_eq!(view.summary(), "Showing 6 to 10 of 10 results");
    }

    #[test]
    fn saving_a_query_persists_it() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = signed_in_app(&temp_dir);
        ask(&mut app, "show me all users");

        app.handle(Msg::SaveQuery);
        app.handle(Msg::Submit);
        assert_eq!(app.editing, Some(EditTarget::SaveTitle));
        assert!(app.status_line.contains("title is required"));

        type_text(&mut app, "All Users");
        app.handle(Msg::NextField);
        app.handle(Msg::Submit);
        assert_eq!(app.editing, None);

        let store = FileSavedQueriesStore::load_from_path(temp_dir.path().join("saved_queries.toml"))
            .expect("store should reload");
        let saved = store.query("/all-users").expect("query saved");
        assert_eq!(saved.title, "All Users");
        assert!(saved.feature_on_homepage);
        assert_eq!(saved.prompt.as_deref(), Some("show me all users"));
    }

    #[test]
    fn export_writes_csv_and_json() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = signed_in_app(&temp_dir);
        ask(&mut app, "show me all users");
        app.handle(Msg::Export);

        let exports = temp_dir.path().join("exports");
        assert!(exports.join("askdb-results.csv").exists());
        assert!(exports.join("askdb-results.json").exists());
        assert!(app.status_line.starts_with("Exported 10 rows"));
    }

    #[test]
    fn schema_setup_toggles_describes_and_saves_columns() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = signed_in_app(&temp_dir);
        app.handle(Msg::NextPane);
        app.handle(Msg::NextPane);
        assert_eq!(app.pane, Pane::SchemaSetup);
        let editor = app.schema_setup.as_ref().expect("ledger schema loaded");
        assert_eq!(editor.summary(), "3 table(s) and 23 column(s)");

        app.handle(Msg::Expand);
        app.handle(Msg::Navigate(DirectionKey::Down));
        app.handle(Msg::Annotate);
        type_text(&mut app, "primary key");
        app.handle(Msg::Submit);
        app.handle(Msg::Toggle);

        let editor = app.schema_setup.as_ref().expect("ledger schema loaded");
        let transactions = editor.tree.group("transactions").expect("known table");
        assert_eq!(transactions.leaves[0].annotation.as_deref(), Some("primary key"));
        assert!(!transactions.leaves[0].selected);
        assert_eq!(editor.summary(), "3 table(s) and 22 column(s)");

        app.handle(Msg::Submit);
        assert!(app.configured_columns.is_some());
        app.handle(Msg::Export);
        assert!(temp_dir
            .path()
            .join("exports")
            .join("askdb-schema.json")
            .exists());
    }

    #[test]
    fn sign_out_returns_to_sign_in_and_clears_the_chat() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut app = signed_in_app(&temp_dir);
        ask(&mut app, "show me all users");

        app.handle(Msg::SignOut);
        assert_eq!(app.pane, Pane::SignIn);
        assert!(app.session.is_none());
        assert!(app.table.is_none());
        assert_eq!(app.transcript.messages().len(), 1);
        assert_eq!(app.editing, Some(EditTarget::Email));
    }
}
