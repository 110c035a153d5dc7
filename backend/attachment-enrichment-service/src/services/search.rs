//! Content listing queries and keyword search widening
//!
//! A [`ContentQuery`] is kept as structured clauses until it is rendered with
//! [`sqlx::QueryBuilder`]. Clause filters registered on a query run exactly
//! once, while it is built, and are then gone.
use crate::models::KEYWORDS_META_KEY;
use sqlx::{Postgres, QueryBuilder};
use std::fmt;

/// Post type of attachments
pub const ATTACHMENT_POST_TYPE: &str = "attachment";

/// One-shot modification of a query's clauses
pub type ClauseFilter = Box<dyn FnOnce(&mut QueryClauses) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    PostType,
    Title,
    Excerpt,
    Content,
    CreatedAt,
    /// Keyword blob of the joined `enrichment_keywords` meta row, as text
    KeywordBlob,
}

impl Column {
    pub fn sql(&self) -> &'static str {
        match self {
            Column::Id => "posts.id",
            Column::PostType => "posts.post_type",
            Column::Title => "posts.title",
            Column::Excerpt => "posts.excerpt",
            Column::Content => "posts.content",
            Column::CreatedAt => "posts.created_at",
            Column::KeywordBlob => "enrichment_keywords.meta_value #>> '{}'",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals {
        column: Column,
        value: String,
    },
    Like {
        column: Column,
        negated: bool,
        pattern: String,
    },
    Any(Vec<Condition>),
    All(Vec<Condition>),
}

impl Condition {
    pub fn like(column: Column, pattern: impl Into<String>) -> Self {
        Condition::Like {
            column,
            negated: false,
            pattern: pattern.into(),
        }
    }

    pub fn not_like(column: Column, pattern: impl Into<String>) -> Self {
        Condition::Like {
            column,
            negated: true,
            pattern: pattern.into(),
        }
    }

    fn render(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        match self {
            Condition::Equals { column, value } => {
                builder.push(column.sql());
                builder.push(" = ");
                builder.push_bind(value.clone());
            }
            Condition::Like {
                column,
                negated,
                pattern,
            } => {
                builder.push(column.sql());
                builder.push(if *negated { " NOT LIKE " } else { " LIKE " });
                builder.push_bind(pattern.clone());
            }
            Condition::Any(conditions) => render_group(builder, conditions, " OR ", "FALSE"),
            Condition::All(conditions) => render_group(builder, conditions, " AND ", "TRUE"),
        }
    }
}

fn render_group(
    builder: &mut QueryBuilder<'static, Postgres>,
    conditions: &[Condition],
    separator: &str,
    empty: &str,
) {
    if conditions.is_empty() {
        builder.push(empty);
        return;
    }
    builder.push("(");
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            builder.push(separator);
        }
        builder.push("(");
        condition.render(builder);
        builder.push(")");
    }
    builder.push(")");
}

/// LEFT JOIN of one metadata key, aliased
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub alias: String,
    pub meta_key: String,
}

impl Join {
    pub fn meta(alias: impl Into<String>, meta_key: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            meta_key: meta_key.into(),
        }
    }
}

/// Clauses of a content query; `conditions` are AND-ed
#[derive(Debug, Clone, PartialEq)]
pub struct QueryClauses {
    pub joins: Vec<Join>,
    pub conditions: Vec<Condition>,
    pub group_by: Option<Column>,
    pub order_by: Column,
    pub descending: bool,
    pub limit: Option<i64>,
}

impl QueryClauses {
    pub fn render(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("SELECT posts.id FROM posts");

        for join in &self.joins {
            builder.push(format!(
                " LEFT JOIN post_meta AS {alias} ON (posts.id = {alias}.post_id AND {alias}.meta_key = ",
                alias = join.alias
            ));
            builder.push_bind(join.meta_key.clone());
            builder.push(")");
        }

        builder.push(" WHERE posts.deleted_at IS NULL");
        for condition in &self.conditions {
            builder.push(" AND ");
            condition.render(&mut builder);
        }

        if let Some(column) = self.group_by {
            builder.push(" GROUP BY ");
            builder.push(column.sql());
        }

        builder.push(" ORDER BY ");
        builder.push(self.order_by.sql());
        builder.push(if self.descending { " DESC" } else { " ASC" });

        if let Some(limit) = self.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }

        builder
    }
}

/// Structured listing query over content items
#[derive(Default)]
pub struct ContentQuery {
    pub post_type: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    filters: Vec<ClauseFilter>,
}

impl fmt::Debug for ContentQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentQuery")
            .field("post_type", &self.post_type)
            .field("search", &self.search)
            .field("limit", &self.limit)
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl ContentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post_type(mut self, post_type: impl Into<String>) -> Self {
        self.post_type = Some(post_type.into());
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn targets_attachments(&self) -> bool {
        self.post_type.as_deref() == Some(ATTACHMENT_POST_TYPE)
    }

    pub fn has_search(&self) -> bool {
        !search_terms(self.search.as_deref().unwrap_or_default()).is_empty()
    }

    /// Register a filter that runs once, the next time the query is built
    pub fn add_filter(&mut self, filter: ClauseFilter) {
        self.filters.push(filter);
    }

    pub fn pending_filters(&self) -> usize {
        self.filters.len()
    }

    /// Clauses before any filter runs
    pub fn clauses(&self) -> QueryClauses {
        let mut conditions = Vec::new();

        if let Some(post_type) = &self.post_type {
            conditions.push(Condition::Equals {
                column: Column::PostType,
                value: post_type.clone(),
            });
        }

        for term in search_terms(self.search.as_deref().unwrap_or_default()) {
            conditions.push(term_condition(&term));
        }

        QueryClauses {
            joins: Vec::new(),
            conditions,
            group_by: None,
            order_by: Column::CreatedAt,
            descending: true,
            limit: self.limit,
        }
    }

    /// Render the query, draining pending filters
    pub fn build(&mut self) -> QueryBuilder<'static, Postgres> {
        let mut clauses = self.clauses();
        for filter in self.filters.drain(..) {
            filter(&mut clauses);
        }
        clauses.render()
    }
}

/// Whitespace-separated terms; a leading `-` excludes the term
fn search_terms(search: &str) -> Vec<String> {
    search
        .split_whitespace()
        .filter(|term| !term.is_empty() && *term != "-")
        .map(str::to_string)
        .collect()
}

fn term_condition(term: &str) -> Condition {
    let (negated, term) = match term.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, term),
    };
    let pattern = format!("%{}%", escape_like(term));

    let columns = [Column::Title, Column::Excerpt, Column::Content];
    if negated {
        Condition::All(
            columns
                .iter()
                .map(|c| Condition::not_like(*c, pattern.clone()))
                .collect(),
        )
    } else {
        Condition::Any(
            columns
                .iter()
                .map(|c| Condition::like(*c, pattern.clone()))
                .collect(),
        )
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Widens attachment searches to the stored keyword blob
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchQueryAugmenter;

impl SearchQueryAugmenter {
    pub fn new() -> Self {
        Self
    }

    /// Register the keyword filter on attachment searches. Returns whether it
    /// was registered.
    pub fn prepare(&self, query: &mut ContentQuery) -> bool {
        if !query.targets_attachments() || !query.has_search() {
            return false;
        }
        query.add_filter(Box::new(widen_with_keywords));
        true
    }
}

/// Join the keyword blob, OR it into every content-body LIKE and group by id
pub fn widen_with_keywords(clauses: &mut QueryClauses) {
    if !clauses.joins.iter().any(|j| j.alias == KEYWORDS_META_KEY) {
        clauses
            .joins
            .push(Join::meta(KEYWORDS_META_KEY, KEYWORDS_META_KEY));
    }

    for condition in clauses.conditions.iter_mut() {
        widen_condition(condition);
    }

    clauses.group_by = Some(Column::Id);
}

fn widen_condition(condition: &mut Condition) {
    match condition {
        Condition::Like {
            column: Column::Content,
            negated,
            pattern,
        } => {
            let keywords = Condition::Like {
                column: Column::KeywordBlob,
                negated: *negated,
                pattern: pattern.clone(),
            };
            let original = std::mem::replace(condition, Condition::Any(Vec::new()));
            *condition = Condition::Any(vec![original, keywords]);
        }
        Condition::Any(conditions) | Condition::All(conditions) => {
            conditions.iter_mut().for_each(widen_condition);
        }
        _ => {}
    }
}
