//! Solidity interfaces of the registry contracts and of initializable modules.

use alloy_sol_types::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface IHub {
        event NewContract(bytes32 indexed contractName, address newContractAddress);
        event NewAssetStorage(bytes32 indexed contractName, address newContractAddress);
        event OwnershipTransferred(address indexed previousOwner, address indexed newOwner);

        function setContractAddress(bytes32 contractName, address newContractAddress) external;
        function setAssetStorageContractAddress(bytes32 contractName, address newContractAddress) external;

        function getContractAddress(bytes32 contractName) external view returns (address);
        function getAssetStorageAddress(bytes32 contractName) external view returns (address);
        function isContract(bytes32 contractName) external view returns (bool);
        function isAssetStorage(bytes32 contractName) external view returns (bool);

        function owner() external view returns (address);
        function transferOwnership(address newOwner) external;
    }
}

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface IHubController {
        function forwardCall(address target, bytes data) external returns (bytes);

        function owner() external view returns (address);
        function transferOwnership(address newOwner) external;
    }
}

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface IInitializable {
        function initialize() external;
    }
}
