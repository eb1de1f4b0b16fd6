use crate::store::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum ReconcileErr {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ReconcileErr>,
    },

    #[error("no group/version/kind found for object {0}")]
    MissingTypeMeta(String),

    #[error("object of kind {0} has no name")]
    MissingName(String),

    #[error("object {0} has no uid")]
    MissingUid(String),

    #[error("object {object} is already controlled by {controller}")]
    AlreadyOwned { object: String, controller: String },

    #[error("controller resource is not bound to this invocation")]
    Unbound,

    #[error("generator error: {0}")]
    Generator(String),

    #[error("watch error: {0}")]
    Watch(String),
}

impl ReconcileErr {
    pub fn context(self, context: &str) -> Self {
        ReconcileErr::Context {
            context: context.to_string(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping context layers.
    pub fn root(&self) -> &ReconcileErr {
        match self {
            ReconcileErr::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), ReconcileErr::Store(e) if e.is_not_found())
    }
}

/// Attach a short description of the failed operation to an error.
pub trait Wrap<T> {
    fn wrap(self, context: &str) -> Result<T, ReconcileErr>;
}

impl<T, E> Wrap<T> for Result<T, E>
where
    E: Into<ReconcileErr>,
{
    fn wrap(self, context: &str) -> Result<T, ReconcileErr> {
        self.map_err(|e| Into::<ReconcileErr>::into(e).context(context))
    }
}
