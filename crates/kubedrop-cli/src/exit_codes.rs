//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed, or aborted at the confirmation prompt
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - invalid options, nothing was sent to the cluster
pub const VALIDATION_ERROR: i32 = 2;

/// Ownership conflict - a same-named resource was not created by kubedrop
pub const OWNERSHIP_CONFLICT: i32 = 3;

/// Timeout - the operation deadline elapsed
pub const TIMEOUT: i32 = 4;

/// Cluster error - configuration, connection or API failure
pub const CLUSTER_ERROR: i32 = 5;

/// Transfer error - copying local files into the container failed
pub const TRANSFER_ERROR: i32 = 6;
