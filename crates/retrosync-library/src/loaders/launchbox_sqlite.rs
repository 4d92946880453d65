//! LaunchBox SQLite library loader
//!
//! The schema is introspected rather than assumed: table and column names are matched
//! against known candidates, lookup tables are joined when present, and anything that
//! cannot be located leaves the corresponding field empty with a warning.

use super::launchbox_xml::{LAUNCHBOX_FIELDS, launchbox_hints, launchbox_key};
use super::{FieldMap, LoadedEntries, Loader, RawEntry, SystemSource, default_rom_root};
use crate::LibraryError;
use crate::model::StableKey;
use retrosync_config::{EcosystemDescriptor, MetadataContainer, template_matches};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Game columns read directly, keyed by the LaunchBox field name they populate
const GAME_COLUMNS: &[(&str, &[&str])] = &[
    ("Title", &["Title", "Name"]),
    ("SortTitle", &["SortTitle"]),
    ("ReleaseDate", &["ReleaseDate", "Released"]),
    ("StarRating", &["StarRating", "Rating", "CommunityStarRating"]),
    ("PlayCount", &["PlayCount"]),
    ("LastPlayedDate", &["LastPlayedDate", "LastPlayed"]),
    ("Favorite", &["Favorite", "IsFavorite"]),
    ("Hide", &["Hide", "Hidden"]),
    ("Notes", &["Notes", "Description", "Overview"]),
    ("MaxPlayers", &["MaxPlayers", "Players"]),
    ("DatabaseID", &["DatabaseID", "DatabaseId"]),
    ("ManualPath", &["ManualPath"]),
    ("VideoPath", &["VideoPath"]),
];

const GAMES_TABLE: &[&str] = &["Games", "Game"];
const PATH_COLUMN: &[&str] = &["ApplicationPath", "RomPath", "FilePath", "Path"];
const ID_COLUMN: &[&str] = &["Id", "GameId"];
const PLATFORM_NAME_COLUMN: &[&str] = &["Platform", "PlatformName"];
const PLATFORM_ID_COLUMN: &[&str] = &["PlatformId"];

/// A text attribute stored either inline or through a lookup table
#[derive(Debug, Clone)]
enum Attribute {
    Inline(String),
    Lookup { column: String, table: String },
    Missing,
}

/// Located pieces of a LaunchBox database
#[derive(Debug, Clone)]
struct Schema {
    games: String,
    path_column: String,
    id_column: Option<String>,
    columns: Vec<(&'static str, String)>,
    platform: Attribute,
    developer: Attribute,
    publisher: Attribute,
    genres: GenreSource,
}

#[derive(Debug, Clone)]
enum GenreSource {
    Inline(String),
    Junction { table: String, genres: String, order: Option<String> },
    Missing,
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn find_name(names: &[String], candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|candidate| {
        names
            .iter()
            .find(|name| name.eq_ignore_ascii_case(candidate))
            .cloned()
    })
}

fn tables(conn: &Connection) -> Result<Vec<String>, LibraryError> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

fn columns(conn: &Connection, table: &str) -> Result<Vec<String>, LibraryError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(table)))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Lookup table with `Id` and `Name` columns
fn lookup_table(
    conn: &Connection,
    tables: &[String],
    candidates: &[&str],
) -> Result<Option<String>, LibraryError> {
    let Some(table) = find_name(tables, candidates) else {
        return Ok(None);
    };
    let cols = columns(conn, &table)?;
    Ok(find_name(&cols, &["Id"]).and(find_name(&cols, &["Name"])).map(|_| table))
}

fn attribute(
    conn: &Connection,
    tables: &[String],
    game_columns: &[String],
    inline: &[&str],
    id: &[&str],
    lookup: &[&str],
) -> Result<Attribute, LibraryError> {
    if let Some(column) = find_name(game_columns, inline) {
        return Ok(Attribute::Inline(column));
    }
    if let Some(column) = find_name(game_columns, id)
        && let Some(table) = lookup_table(conn, tables, lookup)?
    {
        return Ok(Attribute::Lookup { column, table });
    }
    Ok(Attribute::Missing)
}

impl Schema {
    fn introspect(conn: &Connection) -> Result<Option<Self>, LibraryError> {
        let tables = tables(conn)?;
        let Some(games) = find_name(&tables, GAMES_TABLE) else {
            return Ok(None);
        };
        let game_columns = columns(conn, &games)?;
        let Some(path_column) = find_name(&game_columns, PATH_COLUMN) else {
            return Ok(None);
        };

        let mapped = GAME_COLUMNS
            .iter()
            .filter_map(|(field, candidates)| {
                find_name(&game_columns, candidates).map(|column| (*field, column))
            })
            .collect();
        let id_column = find_name(&game_columns, ID_COLUMN);

        let platform = attribute(
            conn,
            &tables,
            &game_columns,
            PLATFORM_NAME_COLUMN,
            PLATFORM_ID_COLUMN,
            &["Platforms", "Platform"],
        )?;
        let developer = attribute(
            conn,
            &tables,
            &game_columns,
            &["Developer"],
            &["DeveloperId"],
            &["Developers", "Developer"],
        )?;
        let publisher = attribute(
            conn,
            &tables,
            &game_columns,
            &["Publisher"],
            &["PublisherId"],
            &["Publishers", "Publisher"],
        )?;

        let genres = if let Some(column) = find_name(&game_columns, &["Genre", "Genres"]) {
            GenreSource::Inline(column)
        } else if id_column.is_some()
            && let Some(table) = find_name(&tables, &["GameGenres", "GameGenre"])
            && let Some(genres) = lookup_table(conn, &tables, &["Genres", "Genre"])?
        {
            let junction = columns(conn, &table)?;
            if find_name(&junction, &["GameId"]).is_some()
                && find_name(&junction, &["GenreId"]).is_some()
            {
                GenreSource::Junction {
                    order: find_name(&junction, &["Position"]),
                    table,
                    genres,
                }
            } else {
                GenreSource::Missing
            }
        } else {
            GenreSource::Missing
        };

        Ok(Some(Schema {
            games,
            path_column,
            id_column,
            columns: mapped,
            platform,
            developer,
            publisher,
            genres,
        }))
    }

    /// SQL expression and join clause for an attribute
    fn select(attribute: &Attribute, alias: &str) -> Option<(String, Option<String>)> {
        match attribute {
            Attribute::Inline(column) => Some((format!("g.{}", quote(column)), None)),
            Attribute::Lookup { column, table } => Some((
                format!("{alias}.\"Name\""),
                Some(format!(
                    "LEFT JOIN {} {alias} ON {alias}.\"Id\" = g.{}",
                    quote(table),
                    quote(column)
                )),
            )),
            Attribute::Missing => None,
        }
    }
}

fn value_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).to_string()),
    }
}

fn open_read_only(path: &Path) -> Result<Connection, LibraryError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

/// Reads a LaunchBox SQLite database; one system per platform row
#[derive(Debug, Default, Clone, Copy)]
pub struct LaunchBoxSqliteLoader;

impl LaunchBoxSqliteLoader {
    /// The database file under a content root
    pub fn database_path(descriptor: &EcosystemDescriptor, content_root: &Path) -> Option<PathBuf> {
        descriptor
            .container_paths
            .iter()
            .flat_map(|template| template_matches(content_root, template))
            .map(|(_, path)| path)
            .next()
            .or_else(|| {
                let data = content_root.join("Data");
                let mut found: Vec<PathBuf> = std::fs::read_dir(&data)
                    .ok()?
                    .flatten()
                    .map(|e| e.path())
                    .filter(|p| {
                        p.is_file()
                            && p.extension().is_some_and(|e| {
                                e.eq_ignore_ascii_case("sqlite") || e.eq_ignore_ascii_case("db")
                            })
                    })
                    .collect();
                found.sort();
                found.into_iter().next()
            })
    }

    fn platforms(conn: &Connection, schema: &Schema) -> Result<Vec<String>, LibraryError> {
        let Some((expr, join)) = Schema::select(&schema.platform, "p") else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT DISTINCT {expr} FROM {} g {} WHERE {expr} IS NOT NULL ORDER BY {expr}",
            quote(&schema.games),
            join.unwrap_or_default()
        );
        let mut stmt = conn.prepare(&sql)?;
        let labels = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(labels)
    }

    fn genres_by_game(
        conn: &Connection,
        schema: &Schema,
    ) -> Result<HashMap<i64, Vec<String>>, LibraryError> {
        let mut genres: HashMap<i64, Vec<String>> = HashMap::new();
        let GenreSource::Junction {
            table,
            genres: names,
            order,
        } = &schema.genres
        else {
            return Ok(genres);
        };
        let order = order
            .as_ref()
            .map(|c| format!("gg.\"GameId\", gg.{}", quote(c)))
            .unwrap_or_else(|| "gg.\"GameId\", gg.rowid".to_string());
        let sql = format!(
            "SELECT gg.\"GameId\", ge.\"Name\" FROM {} gg JOIN {} ge ON ge.\"Id\" = gg.\"GenreId\" ORDER BY {order}",
            quote(table),
            quote(names)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (game, name) = row?;
            genres.entry(game).or_default().push(name);
        }
        Ok(genres)
    }
}

impl Loader for LaunchBoxSqliteLoader {
    fn container(&self) -> MetadataContainer {
        MetadataContainer::Sqlite
    }

    fn discover(
        &self,
        descriptor: &EcosystemDescriptor,
        content_root: &Path,
    ) -> Result<Vec<SystemSource>, LibraryError> {
        let Some(db) = Self::database_path(descriptor, content_root) else {
            return Ok(Vec::new());
        };
        let conn = open_read_only(&db)?;
        let Some(schema) = Schema::introspect(&conn)? else {
            return Err(LibraryError::LoaderParse {
                system: String::new(),
                path: db,
                message: "no games table with an application path column".to_string(),
            });
        };

        let labels = Self::platforms(&conn, &schema)?;
        if labels.is_empty() {
            tracing::warn!("{}: no platform information, nothing to load", db.display());
        }
        Ok(labels
            .into_iter()
            .map(|label| {
                let rom_root = default_rom_root(descriptor, content_root, &label);
                SystemSource::new(label, content_root, rom_root, Some(db.clone()))
            })
            .collect())
    }

    fn load(
        &self,
        source: &SystemSource,
        _descriptor: &EcosystemDescriptor,
    ) -> Result<LoadedEntries, LibraryError> {
        let mut loaded = LoadedEntries::default();
        let Some(db) = &source.container_path else {
            return Ok(loaded);
        };
        let conn = open_read_only(db)?;
        let schema = Schema::introspect(&conn)?.ok_or_else(|| LibraryError::LoaderParse {
            system: source.platform_label.clone(),
            path: db.clone(),
            message: "no games table with an application path column".to_string(),
        })?;

        let mut select = vec![format!("g.{}", quote(&schema.path_column))];
        let mut names: Vec<&str> = vec!["ApplicationPath"];
        let mut joins = Vec::new();
        for (field, column) in &schema.columns {
            select.push(format!("g.{}", quote(column)));
            names.push(*field);
        }
        for (field, attribute, alias) in [
            ("Developer", &schema.developer, "d"),
            ("Publisher", &schema.publisher, "pu"),
        ] {
            match Schema::select(attribute, alias) {
                Some((expr, join)) => {
                    select.push(expr);
                    names.push(field);
                    joins.extend(join);
                }
                None => loaded
                    .warnings
                    .push(format!("{}: no {field} information in database", source.platform_label)),
            }
        }
        if let GenreSource::Inline(column) = &schema.genres {
            select.push(format!("g.{}", quote(column)));
            names.push("Genre");
        } else if matches!(schema.genres, GenreSource::Missing) {
            loaded
                .warnings
                .push(format!("{}: no genre information in database", source.platform_label));
        }
        if let Some(id) = &schema.id_column {
            select.push(format!("g.{}", quote(id)));
            names.push("__id");
        }

        let Some((platform_expr, platform_join)) = Schema::select(&schema.platform, "p") else {
            return Ok(loaded);
        };
        joins.extend(platform_join);

        let sql = format!(
            "SELECT {} FROM {} g {} WHERE {platform_expr} = ?1 ORDER BY g.rowid",
            select.join(", "),
            quote(&schema.games),
            joins.join(" ")
        );
        let genres = Self::genres_by_game(&conn, &schema)?;

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([&source.platform_label])?;
        while let Some(row) = rows.next()? {
            let mut entry = RawEntry::default();
            for (i, name) in names.iter().enumerate() {
                if let Some(value) = value_text(row.get_ref(i)?) {
                    entry.fields.insert(name.to_string(), value);
                }
            }
            if let Some(id) = entry.fields.remove("__id")
                && let Ok(id) = id.parse::<i64>()
                && let Some(list) = genres.get(&id)
            {
                entry.fields.insert("Genre".to_string(), list.join("; "));
            }

            let Some(reference) = entry.field("ApplicationPath").map(str::to_string) else {
                loaded.warnings.push(format!(
                    "{}: row without application path skipped",
                    entry.field("Title").unwrap_or("<untitled>")
                ));
                continue;
            };
            entry.rom_ref = reference;
            entry.hints = launchbox_hints(&entry);
            loaded.entries.push(entry);
        }

        Ok(loaded)
    }

    fn field_map(&self) -> &'static FieldMap {
        &LAUNCHBOX_FIELDS
    }

    fn stable_key(&self, entry: &RawEntry) -> Option<StableKey> {
        launchbox_key(entry)
    }
}
