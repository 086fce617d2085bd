use crate::foundation::BridgeError;
use ethers::types::U256;

/// Number of big-endian u64 limbs a proof instance array must carry:
/// three 256-bit words of four limbs each.
pub const MIN_INSTANCE_LIMBS: usize = 12;

/// The three 256-bit values folded out of a proof instance array.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InstanceRoots {
    /// Previous state root.
    pub merkle_root: U256,
    /// State root after the bundle applies.
    pub new_merkle_root: U256,
    /// SHA digest of the bundle's transaction data.
    pub sha_hash: U256,
}

/// Fold limb quadruples `[i, i+1, i+2, i+3]` into one 256-bit word,
/// most significant limb first.
fn fold_limbs(limbs: &[u64]) -> U256 {
    (U256::from(limbs[0]) << 192) | (U256::from(limbs[1]) << 128) | (U256::from(limbs[2]) << 64) | U256::from(limbs[3])
}

/// Reduce a proof instance array to its merkle roots and sha digest.
/// Fails without advancing anything when fewer than twelve limbs are
/// present.
pub fn reduce_instances(inst: &[u64]) -> Result<InstanceRoots, BridgeError> {
    if inst.len() < MIN_INSTANCE_LIMBS {
        return Err(BridgeError::InstanceTooShort { len: inst.len(), need: MIN_INSTANCE_LIMBS });
    }
    Ok(InstanceRoots {
        merkle_root: fold_limbs(&inst[0..4]),
        new_merkle_root: fold_limbs(&inst[4..8]),
        sha_hash: fold_limbs(&inst[8..12]),
    })
}

/// Render a 256-bit word as `0x` + 64 zero-padded hex digits.
pub fn to_hex32(value: U256) -> String {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}
