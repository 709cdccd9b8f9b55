use thiserror::Error;

/// Fallos a nivel de lote: ningún snapshot se publica si aparece uno.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no pude obtener {source_name}: {detail}")]
    SourceFetch { source_name: String, detail: String },

    #[error("documento inválido en {source_name}: {detail}")]
    ConfigParse { source_name: String, detail: String },
}

/// Problemas de una sola fila; se saltan y el lote continúa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowIssue {
    UnknownRecordType {
        group: String,
        name: String,
        kind: String,
    },
    InvalidCidr {
        group: String,
        prefix: String,
        detail: String,
    },
    InvalidTtl {
        group: String,
        name: String,
        ttl: String,
    },
    MissingField {
        group: String,
        name: String,
        field: &'static str,
    },
}

impl std::fmt::Display for RowIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowIssue::UnknownRecordType { group, name, kind } => {
                write!(f, "tipo desconocido {kind:?} para {name} (grupo {group})")
            }
            RowIssue::InvalidCidr {
                group,
                prefix,
                detail,
            } => write!(f, "prefijo inválido {prefix:?} en grupo {group}: {detail}"),
            RowIssue::InvalidTtl { group, name, ttl } => {
                write!(f, "ttl inválido {ttl} para {name} (grupo {group})")
            }
            RowIssue::MissingField { group, name, field } => {
                write!(f, "falta {field} en fila {name:?} (grupo {group})")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream: error de transporte resolviendo {target}: {detail}")]
    Transport { target: String, detail: String },
}

/// Errores internos del motor de vistas. Distintos de NoMatch, pero el
/// llamador también debe pasar la consulta al siguiente handler.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("deadline vencido esperando al upstream para {target}")]
    DeadlineExceeded { target: String },

    #[error("destino CNAME inválido {value:?}: {detail}")]
    InvalidTarget { value: String, detail: String },

    #[error("worker de vista falló: {0}")]
    Worker(String),
}

/// Errores de arranque / configuración del proceso.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("falta argumento requerido: {0}")]
    MissingSource(&'static str),

    #[error("configuración inválida: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Load(#[from] LoadError),
}
