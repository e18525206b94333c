//! Configuration merging functionality

use super::source::ConfigValues;

/// Trait for merging configurations
pub trait ConfigMerger {
    /// Merge another configuration into this one
    ///
    /// Values set in `other` override values in `self`. This implements the
    /// configuration priority system: merge sources from lowest to highest
    /// priority.
    fn merge(self, other: Self) -> Self
    where
        Self: Sized;
}

impl ConfigMerger for ConfigValues {
    fn merge(self, other: Self) -> Self {
        Self {
            listen: other.listen.or(self.listen),
            upstream: other.upstream.or(self.upstream),
            tls_verify: other.tls_verify.or(self.tls_verify),
            ca_file: other.ca_file.or(self.ca_file),
            server_name: other.server_name.or(self.server_name),
            buffer_size: other.buffer_size.or(self.buffer_size),
            connect_timeout: other.connect_timeout.or(self.connect_timeout),
            drain_timeout: other.drain_timeout.or(self.drain_timeout),
            shutdown_timeout: other.shutdown_timeout.or(self.shutdown_timeout),
            log_level: other.log_level.or(self.log_level),
        }
    }
}
