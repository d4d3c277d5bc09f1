use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Engine type of a connection. Fixed when the connection is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Postgres,
    Mysql,
    Mssql,
    Oracle,
    Db2,
    Mongo,
    Cassandra,
}

/// Structural family a dialect belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFamily {
    Relational,
    Document,
    WideColumn,
}

impl DialectKind {
    pub const ALL: [DialectKind; 7] = [
        DialectKind::Postgres,
        DialectKind::Mysql,
        DialectKind::Mssql,
        DialectKind::Oracle,
        DialectKind::Db2,
        DialectKind::Mongo,
        DialectKind::Cassandra,
    ];

    pub fn family(self) -> EngineFamily {
        match self {
            DialectKind::Postgres
            | DialectKind::Mysql
            | DialectKind::Mssql
            | DialectKind::Oracle
            | DialectKind::Db2 => EngineFamily::Relational,
            DialectKind::Mongo => EngineFamily::Document,
            DialectKind::Cassandra => EngineFamily::WideColumn,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DialectKind::Postgres => "postgres",
            DialectKind::Mysql => "mysql",
            DialectKind::Mssql => "mssql",
            DialectKind::Oracle => "oracle",
            DialectKind::Db2 => "db2",
            DialectKind::Mongo => "mongo",
            DialectKind::Cassandra => "cassandra",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(DialectKind::Postgres),
            "mysql" | "mariadb" => Ok(DialectKind::Mysql),
            "mssql" | "sqlserver" => Ok(DialectKind::Mssql),
            "oracle" | "oracledb" => Ok(DialectKind::Oracle),
            "db2" | "ibmdb2" => Ok(DialectKind::Db2),
            "mongo" | "mongodb" => Ok(DialectKind::Mongo),
            "cassandra" | "scylla" => Ok(DialectKind::Cassandra),
            other => Err(format!("unknown database kind '{}'", other)),
        }
    }
}
