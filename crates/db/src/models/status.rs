//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data in the
//! corresponding `*_statuses` database table.

use sgpi_core::document::DocumentStatus;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up the variant for a database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Row-level id of a document's upload status (`document_statuses`).
    DocumentStatusId {
        Pending = 1,
        Uploading = 2,
        Completed = 3,
        Error = 4,
    }
}

impl From<DocumentStatus> for DocumentStatusId {
    fn from(status: DocumentStatus) -> Self {
        match status {
            DocumentStatus::Pending => Self::Pending,
            DocumentStatus::Uploading => Self::Uploading,
            DocumentStatus::Completed => Self::Completed,
            DocumentStatus::Error => Self::Error,
        }
    }
}

impl From<DocumentStatusId> for DocumentStatus {
    fn from(id: DocumentStatusId) -> Self {
        match id {
            DocumentStatusId::Pending => Self::Pending,
            DocumentStatusId::Uploading => Self::Uploading,
            DocumentStatusId::Completed => Self::Completed,
            DocumentStatusId::Error => Self::Error,
        }
    }
}
