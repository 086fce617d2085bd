use ethers::types::U256;
use zkbridge_core::domain::deposit::scale_amount;
use zkbridge_core::foundation::BridgeError;

#[test]
fn one_whole_token_is_credited() {
    assert_eq!(scale_amount(U256::exp10(18), 0).expect("scale"), 1);
}

#[test]
fn one_wei_short_is_dust() {
    let amount = U256::exp10(18) - U256::one();
    assert_eq!(scale_amount(amount, 0).expect("scale"), 0);
}

#[test]
fn fractional_part_truncates() {
    let amount = U256::exp10(18) * U256::from(5u64) + U256::exp10(17) * U256::from(9u64);
    assert_eq!(scale_amount(amount, 0).expect("scale"), 5);
}

#[test]
fn precision_parameterizes_the_divisor() {
    // 6 decimals already applied on L1: divide by 10^12.
    assert_eq!(scale_amount(U256::exp10(12), 6).expect("scale"), 1);
    assert_eq!(scale_amount(U256::exp10(12) - U256::one(), 6).expect("scale"), 0);
    // 18 decimals: the raw value passes through.
    assert_eq!(scale_amount(U256::from(42u64), 18).expect("scale"), 42);
}

#[test]
fn oversized_amounts_error_instead_of_truncating() {
    let err = scale_amount(U256::MAX, 18).expect_err("overflow");
    assert!(matches!(err, BridgeError::AmountOverflow { .. }));
}
