//! Engine constants and binding-bridge compatibility identifiers.

use crate::spec::CopyTreeError;

/// Bridge ABI revision exported to binding layers.
pub const N_BRIDGE_ABI_VERSION: u64 = 1;
/// Stable contract identifier for the `copy_tree` operation.
pub const C_BRIDGE_CONTRACT_VERSION: &str = "copykit.fs.copy_tree.v1";
/// Transport identifier for in-process native callers.
pub const C_BRIDGE_TRANSPORT: &str = "rust_native";

/// Capacity of the bounded walker-to-pool task queue.
pub(crate) const N_TASK_QUEUE_CAP: usize = 1024;
/// Worker ceiling applied when the caller does not pass `num_workers_max`.
pub(crate) const N_WORKERS_DEFAULT_MAX: usize = 8;

/// Check a binding layer's expected bridge triple against this engine.
///
/// Boundary layers call this once at startup, before the first
/// [`crate::copy_tree`] invocation, and fail fast on mismatch.
pub fn validate_bridge_contract(
    n_abi: u64,
    c_contract: &str,
    c_transport: &str,
) -> Result<(), CopyTreeError> {
    if n_abi != N_BRIDGE_ABI_VERSION {
        return Err(CopyTreeError::BridgeContractMismatch {
            expected: format!("abi={N_BRIDGE_ABI_VERSION}"),
            actual: format!("abi={n_abi}"),
        });
    }
    if c_contract != C_BRIDGE_CONTRACT_VERSION {
        return Err(CopyTreeError::BridgeContractMismatch {
            expected: format!("contract={C_BRIDGE_CONTRACT_VERSION}"),
            actual: format!("contract={c_contract}"),
        });
    }
    if c_transport != C_BRIDGE_TRANSPORT {
        return Err(CopyTreeError::BridgeContractMismatch {
            expected: format!("transport={C_BRIDGE_TRANSPORT}"),
            actual: format!("transport={c_transport}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_contract_accepts_matching_triple() {
        assert!(
            validate_bridge_contract(
                N_BRIDGE_ABI_VERSION,
                C_BRIDGE_CONTRACT_VERSION,
                C_BRIDGE_TRANSPORT
            )
            .is_ok()
        );
    }

    #[test]
    fn bridge_contract_rejects_each_component() {
        let err = validate_bridge_contract(99, C_BRIDGE_CONTRACT_VERSION, C_BRIDGE_TRANSPORT)
            .expect_err("abi mismatch must fail");
        assert!(matches!(err, CopyTreeError::BridgeContractMismatch { .. }));

        assert!(
            validate_bridge_contract(N_BRIDGE_ABI_VERSION, "other.contract", C_BRIDGE_TRANSPORT)
                .is_err()
        );
        assert!(
            validate_bridge_contract(N_BRIDGE_ABI_VERSION, C_BRIDGE_CONTRACT_VERSION, "ffi")
                .is_err()
        );
    }
}
