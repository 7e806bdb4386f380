use std::str::FromStr;

use rusqlite::Connection;
use serde::Serialize;

use crate::db::DatabaseError;
use crate::models::enums::Category;

/// A row of the fixed category lookup table.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryInfo {
    pub category: Category,
    pub color: String,
    pub sort_order: i32,
}

pub fn list_categories(conn: &Connection) -> Result<Vec<CategoryInfo>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT name, color, sort_order FROM categories ORDER BY sort_order ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i32>(2)?,
        ))
    })?;

    let mut categories = Vec::new();
    for row in rows {
        let (name, color, sort_order) = row?;
        categories.push(CategoryInfo {
            category: Category::from_str(&name)?,
            color,
            sort_order,
        });
    }
    Ok(categories)
}
