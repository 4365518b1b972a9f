//! ABI of the `Upload` registry contract.

use alloy::sol;

sol! {
    #[sol(rpc)]
    contract Upload {
        struct Access {
            address user;
            bool access;
        }

        function add(address _user, string url) external;
        function allow(address user) external;
        function disallow(address user) external;
        function display(address _user) external view returns (string[] memory);
        function shareAccess() public view returns (Access[] memory);
    }
}
