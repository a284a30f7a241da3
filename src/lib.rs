pub mod crypto;
pub mod block;
pub mod capacity;
pub mod codec;
pub mod recovery;
pub mod layout;
pub mod visual;
pub mod backup;
pub mod service;
pub mod config;
pub mod logging;

pub use backup::{create_backup, reassemble, recover_secret, Backup, BackupError, BackupOptions};
pub use block::{Block, Secret};
pub use codec::{join, partition, OrderedFragment};
pub use config::Config;
pub use crypto::{Argon2Kdf, Kdf, KdfParams};
pub use recovery::{classify, AuxiliaryTargets, ScanItem, SessionState};
pub use service::RestoreService;
