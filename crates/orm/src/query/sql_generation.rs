//! Query Builder SQL generation
//!
//! Renders the structured query as PostgreSQL-flavoured SQL, either with `$n`
//! placeholders and a parameter list or with the values inlined for display.

use crate::backends::DatabaseValue;

use super::builder::QueryBuilder;
use super::types::*;

/// Accumulates parameters while rendering, shared across sub-queries so the
/// placeholder numbering stays continuous
struct SqlWriter {
    params: Vec<DatabaseValue>,
    inline: bool,
}

impl SqlWriter {
    fn value(&mut self, value: &DatabaseValue) -> String {
        if self.inline {
            format_value(value)
        } else {
            self.params.push(value.clone());
            format!("${}", self.params.len())
        }
    }
}

impl<M> QueryBuilder<M> {
    /// Generate SQL from query with parameter placeholders and return parameters
    pub fn to_sql_with_params(&self) -> (String, Vec<DatabaseValue>) {
        let mut writer = SqlWriter {
            params: Vec::new(),
            inline: false,
        };
        let sql = self.render(&mut writer);
        (sql, writer.params)
    }

    /// Generate SQL with the values inlined, for logging and inspection
    pub fn to_sql(&self) -> String {
        let mut writer = SqlWriter {
            params: Vec::new(),
            inline: true,
        };
        self.render(&mut writer)
    }

    fn render(&self, writer: &mut SqlWriter) -> String {
        match self.query_type {
            QueryType::Select => self.build_select_sql(writer),
            QueryType::Insert => self.build_insert_sql(writer),
            QueryType::Update => self.build_update_sql(writer),
            QueryType::Delete => self.build_delete_sql(writer),
        }
    }

    fn from_clause(&self) -> String {
        match &self.from_alias {
            Some(alias) => format!("{} AS {}", self.get_table(), alias),
            None => self.get_table().to_string(),
        }
    }

    /// Build SELECT SQL
    fn build_select_sql(&self, writer: &mut SqlWriter) -> String {
        let mut sql = String::from(if self.distinct { "SELECT DISTINCT " } else { "SELECT " });

        if let Some(aggregate) = &self.aggregate {
            sql.push_str(&format!("{}({}) AS aggregate", aggregate.function, aggregate.column));
        } else if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }

        if self.from_table.is_some() {
            sql.push_str(" FROM ");
            sql.push_str(&self.from_clause());
        }

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.join_type.to_string());
            sql.push(' ');
            sql.push_str(&join.table);
            if let Some(alias) = &join.alias {
                sql.push_str(&format!(" AS {}", alias));
            }
            sql.push_str(" ON ");
            let conditions: Vec<String> = join
                .on_conditions
                .iter()
                .map(|(left, right)| format!("{} = {}", left, right))
                .collect();
            sql.push_str(&conditions.join(" AND "));
        }

        self.build_where_clause(&mut sql, writer);

        if !self.groups.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.groups.join(", "));
        }

        if !self.orders.is_empty() {
            let orders: Vec<String> = self
                .orders
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }

        if let Some(limit) = self.limit_count {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset_value {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }

    /// Build INSERT SQL, rows missing a column get DEFAULT
    fn build_insert_sql(&self, writer: &mut SqlWriter) -> String {
        let mut sql = format!("INSERT INTO {}", self.get_table());

        let mut columns: Vec<&str> = Vec::new();
        for clause in self.insert_rows.iter().flatten() {
            if !columns.contains(&clause.column.as_str()) {
                columns.push(clause.column.as_str());
            }
        }

        if columns.is_empty() {
            sql.push_str(" DEFAULT VALUES");
            return sql;
        }

        sql.push_str(&format!(" ({}) VALUES ", columns.join(", ")));

        let rows: Vec<String> = self
            .insert_rows
            .iter()
            .map(|row| {
                let values: Vec<String> = columns
                    .iter()
                    .map(|column| {
                        row.iter()
                            .find(|clause| clause.column == *column)
                            .map(|clause| writer.value(&clause.value))
                            .unwrap_or_else(|| "DEFAULT".to_string())
                    })
                    .collect();
                format!("({})", values.join(", "))
            })
            .collect();
        sql.push_str(&rows.join(", "));

        sql
    }

    /// Build UPDATE SQL
    fn build_update_sql(&self, writer: &mut SqlWriter) -> String {
        let mut sql = format!("UPDATE {} SET ", self.from_clause());

        let sets: Vec<String> = self
            .set_clauses
            .iter()
            .map(|clause| format!("{} = {}", clause.column, writer.value(&clause.value)))
            .collect();
        sql.push_str(&sets.join(", "));

        self.build_where_clause(&mut sql, writer);
        sql
    }

    /// Build DELETE SQL
    fn build_delete_sql(&self, writer: &mut SqlWriter) -> String {
        let mut sql = format!("DELETE FROM {}", self.from_clause());
        self.build_where_clause(&mut sql, writer);
        sql
    }

    fn build_where_clause(&self, sql: &mut String, writer: &mut SqlWriter) {
        if self.wheres.is_empty() {
            return;
        }
        sql.push_str(" WHERE ");
        sql.push_str(&render_wheres(&self.wheres, writer));
    }
}

fn render_wheres(wheres: &[WhereClause], writer: &mut SqlWriter) -> String {
    let mut sql = String::new();

    for (index, clause) in wheres.iter().enumerate() {
        if index > 0 {
            sql.push_str(&format!(" {} ", clause.boolean()));
        }
        sql.push_str(&render_where(clause, writer));
    }

    sql
}

fn render_where(clause: &WhereClause, writer: &mut SqlWriter) -> String {
    match clause {
        WhereClause::Basic { column, operator, value, .. } => {
            format!("{} {} {}", column, operator, writer.value(value))
        }
        WhereClause::In { values, not, .. } if values.is_empty() => {
            // an empty IN list matches nothing, an empty NOT IN everything
            if *not { "1 = 1".to_string() } else { "0 = 1".to_string() }
        }
        WhereClause::In { column, values, not, .. } => {
            let placeholders: Vec<String> = values.iter().map(|value| writer.value(value)).collect();
            format!(
                "{} {}IN ({})",
                column,
                if *not { "NOT " } else { "" },
                placeholders.join(", ")
            )
        }
        WhereClause::Null { column, not, .. } => {
            format!("{} IS {}NULL", column, if *not { "NOT " } else { "" })
        }
        WhereClause::Column { first, operator, second, .. } => {
            format!("{} {} {}", first, operator, second)
        }
        WhereClause::Exists { query, not, .. } => {
            format!("{}EXISTS ({})", if *not { "NOT " } else { "" }, query.render(writer))
        }
        WhereClause::Count { query, operator, count, .. } => {
            let sub = query.render(writer);
            format!("({}) {} {}", sub, operator, writer.value(&DatabaseValue::Int64(*count)))
        }
        WhereClause::Nested { query, .. } => format!("({})", render_wheres(&query.wheres, writer)),
        WhereClause::Raw { sql, .. } => sql.clone(),
    }
}

/// Format a value as an SQL literal
pub fn format_value(value: &DatabaseValue) -> String {
    match value {
        DatabaseValue::Null => "NULL".to_string(),
        DatabaseValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        DatabaseValue::Int32(i) => i.to_string(),
        DatabaseValue::Int64(i) => i.to_string(),
        DatabaseValue::Float32(f) => f.to_string(),
        DatabaseValue::Float64(f) => f.to_string(),
        DatabaseValue::String(s) => format!("'{}'", s.replace('\'', "''")),
        DatabaseValue::Bytes(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
            format!("'\\x{}'", hex)
        }
        DatabaseValue::Uuid(u) => format!("'{}'", u),
        DatabaseValue::DateTime(dt) => format!("'{}'", dt.to_rfc3339()),
        DatabaseValue::Date(d) => format!("'{}'", d),
        DatabaseValue::Time(t) => format!("'{}'", t),
        DatabaseValue::Json(j) => format!("'{}'", j.to_string().replace('\'', "''")),
        DatabaseValue::Array(values) => {
            let items: Vec<String> = values.iter().map(format_value).collect();
            format!("({})", items.join(", "))
        }
    }
}
