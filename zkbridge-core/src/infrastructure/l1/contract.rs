use ethers::contract::abigen;

// Human-readable ABI of the settlement proxy. Event topics depend on
// parameter types only, so `TopUp` here matches
// keccak256("TopUp(address,address,uint256,uint256,uint256)").
abigen!(
    SettlementProxy,
    r#"[
        struct TokenInfo { address token_uid; }
        event TopUp(address token, address user, uint256 pid_1, uint256 pid_2, uint256 amount)
        function allTokens() external view returns (TokenInfo[] memory)
        function verify(bytes calldata txData, uint256[] calldata proofArr, uint256[] calldata verifyInstanceArr, uint256[] calldata auxArr, uint256[][] calldata instArr) external
    ]"#
);
