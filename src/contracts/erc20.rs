use ethers::prelude::*;

// Read-only ERC-20 metadata used to cross-check declared tokens
abigen!(
    Erc20Metadata,
    r#"[
        function symbol() external view returns (string)
        function decimals() external view returns (uint8)
    ]"#
);
