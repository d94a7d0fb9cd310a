//! Dialect registry.
//!
//! Every supported database kind maps to one immutable [`Dialect`]
//! descriptor. The SQL compiler only ever reads the descriptor, so adding a
//! database is a matter of adding a row to [`DIALECTS`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported database products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseKind {
    H2,
    #[serde(rename = "mysql")]
    MySql,
    Oracle,
    Firebird,
    #[default]
    #[serde(rename = "postgresql")]
    PostgreSql,
    #[serde(rename = "mssql")]
    MsSql,
    #[serde(rename = "mssql_jtds")]
    MsSqlJtds,
    Progress,
    #[serde(rename = "pervasive_psql")]
    PervasivePsql,
}

impl DatabaseKind {
    pub const ALL: [DatabaseKind; 9] = [
        DatabaseKind::H2,
        DatabaseKind::MySql,
        DatabaseKind::Oracle,
        DatabaseKind::Firebird,
        DatabaseKind::PostgreSql,
        DatabaseKind::MsSql,
        DatabaseKind::MsSqlJtds,
        DatabaseKind::Progress,
        DatabaseKind::PervasivePsql,
    ];

    /// The descriptor for this kind.
    pub fn dialect(self) -> &'static Dialect {
        // DIALECTS is ordered like ALL
        &DIALECTS[self as usize]
    }

    /// Stable identifier, e.g. `"postgresql"` or `"mssql_jtds"`.
    pub fn id(self) -> &'static str {
        match self {
            DatabaseKind::H2 => "h2",
            DatabaseKind::MySql => "mysql",
            DatabaseKind::Oracle => "oracle",
            DatabaseKind::Firebird => "firebird",
            DatabaseKind::PostgreSql => "postgresql",
            DatabaseKind::MsSql => "mssql",
            DatabaseKind::MsSqlJtds => "mssql_jtds",
            DatabaseKind::Progress => "progress",
            DatabaseKind::PervasivePsql => "pervasive_psql",
        }
    }

    /// Case-insensitive lookup that falls back to PostgreSQL for unknown names.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for DatabaseKind {
    type Err = crate::DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        DatabaseKind::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| crate::DbError::Config(format!("unknown database kind '{s}'")))
    }
}

/// Where (and whether) the row limit goes in a SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSyntax {
    /// `select top n ...`
    Top,
    /// `select first n ...`
    First,
    /// `... limit n`
    Limit,
    /// `... where rownum <= n`
    RowNum,
    None,
}

/// How a projection alias is attached to its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasStyle {
    /// `field "alias"`
    Bare,
    /// `field as "alias"`
    As,
}

/// Immutable SQL quirks and connection data for one database kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub kind: DatabaseKind,
    /// Driver identifier (driver class or connector name).
    pub driver: &'static str,
    /// Connection URL template with `$dbServer`, `$dbPort`, `$dbDir` and `$dbName` placeholders.
    pub url_template: &'static str,
    /// Variant used when an instance name is configured.
    pub instance_url_template: Option<&'static str>,
    /// Opening and closing identifier quote.
    pub quote: (char, char),
    pub alias_style: AliasStyle,
    pub limit: LimitSyntax,
    /// Append `with (nolock)` to every SELECT.
    pub nolock_hint: bool,
    /// The driver can look up result columns by a dotted label.
    pub qualified_labels: bool,
}

impl Dialect {
    /// Quote an identifier (schema name, alias).
    pub fn quote(&self, ident: &str) -> String {
        let (open, close) = self.quote;
        format!("{open}{ident}{close}")
    }

    /// Render the connection URL for the given endpoint.
    ///
    /// When `instance` is set and the dialect has an instance-name variant,
    /// that variant is used instead of the host/port one.
    pub fn render_url(
        &self,
        server: &str,
        port: &str,
        dir: &str,
        db_name: &str,
        instance: Option<&str>,
    ) -> String {
        let template = match (instance, self.instance_url_template) {
            (Some(inst), Some(t)) if !inst.is_empty() => t,
            _ => self.url_template,
        };
        template
            .replace("$dbServer", server)
            .replace("$dbPort", port)
            .replace("$dbDir", dir)
            .replace("$dbName", db_name)
            .replace("$instanceName", instance.unwrap_or_default())
    }
}

const fn dialect(
    kind: DatabaseKind,
    driver: &'static str,
    url_template: &'static str,
    limit: LimitSyntax,
) -> Dialect {
    Dialect {
        kind,
        driver,
        url_template,
        instance_url_template: None,
        quote: ('"', '"'),
        alias_style: AliasStyle::Bare,
        limit,
        nolock_hint: false,
        qualified_labels: true,
    }
}

/// The registry, ordered like [`DatabaseKind::ALL`].
pub static DIALECTS: [Dialect; 9] = [
    dialect(
        DatabaseKind::H2,
        "org.h2.Driver",
        "jdbc:h2:tcp://$dbServer:$dbPort//$dbDir/$dbName",
        LimitSyntax::Top,
    ),
    Dialect {
        quote: ('`', '`'),
        ..dialect(
            DatabaseKind::MySql,
            "com.mysql.jdbc.Driver",
            "jdbc:mysql://$dbServer:$dbPort/$dbName",
            LimitSyntax::Limit,
        )
    },
    dialect(
        DatabaseKind::Oracle,
        "oracle.jdbc.driver.OracleDriver",
        "jdbc:oracle:thin:@//$dbServer:$dbPort/$dbName",
        LimitSyntax::RowNum,
    ),
    dialect(
        DatabaseKind::Firebird,
        "org.firebirdsql.jdbc.FBDriver",
        "jdbc:firebirdsql://$dbServer:$dbPort/$dbName",
        LimitSyntax::First,
    ),
    Dialect {
        alias_style: AliasStyle::As,
        ..dialect(
            DatabaseKind::PostgreSql,
            "tokio-postgres",
            "postgresql://$dbServer:$dbPort/$dbName",
            LimitSyntax::Limit,
        )
    },
    Dialect {
        instance_url_template: Some(
            "jdbc:sqlserver://$dbServer;instanceName=$instanceName;databaseName=$dbName",
        ),
        ..dialect(
            DatabaseKind::MsSql,
            "com.microsoft.sqlserver.jdbc.SQLServerDriver",
            "jdbc:sqlserver://$dbServer:$dbPort;databaseName=$dbName",
            LimitSyntax::Top,
        )
    },
    Dialect {
        instance_url_template: Some("jdbc:jtds:sqlserver://$dbServer/$dbName;instance=$instanceName"),
        ..dialect(
            DatabaseKind::MsSqlJtds,
            "net.sourceforge.jtds.jdbc.Driver",
            "jdbc:jtds:sqlserver://$dbServer:$dbPort/$dbName",
            LimitSyntax::Top,
        )
    },
    Dialect {
        nolock_hint: true,
        ..dialect(
            DatabaseKind::Progress,
            "com.ddtek.jdbc.openedge.OpenEdgeDriver",
            "jdbc:datadirect:openedge://$dbServer:$dbPort;databaseName=$dbName",
            LimitSyntax::Top,
        )
    },
    Dialect {
        qualified_labels: false,
        ..dialect(
            DatabaseKind::PervasivePsql,
            "com.pervasive.jdbc.v2.Driver",
            "jdbc:pervasive://$dbServer:$dbPort/$dbName",
            LimitSyntax::Top,
        )
    },
];
