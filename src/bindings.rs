use alloy::sol;

sol! {
    /// Interface of the on-chain payroll ledger. Mirrors the deployed
    /// contract ABI; event signatures are the source of the topic0
    /// selectors used by the decoder.
    #[sol(rpc)]
    #[derive(Debug)]
    contract Payroll {
        event Deposited(address indexed from, uint256 amount);
        event Withdrawn(address indexed who, uint256 amount);
        event SalaryPaid(address indexed to, uint256 amount);
        event CheckedIn(address indexed who, uint256 ts);
        event CheckedOut(address indexed who, uint256 ts, uint256 workedMinutes);

        function employees(address who) external view returns (string memory name, uint256 hourlyRate, uint256 accrued, bool exists);
        function allEmployees() external view returns (address[] memory);
        function getEmployeeCount() external view returns (uint256);
        function accruedOf(address who) external view returns (uint256);
        function attendanceCount(address who) external view returns (uint256);
        function attendance(address who, uint256 offset, uint256 limit) external view returns (uint256[] memory timestamps, uint256[] memory workedMinutes);
        function contractBalance() external view returns (uint256);
        function getOwner() external view returns (address);

        function addEmployee(address who, string calldata name, uint256 hourlyRate) external;
        function updateRate(address who, uint256 hourlyRate) external;
        function removeEmployee(address who) external;
        function checkIn() external;
        function checkOut() external;
        function withdraw() external;
        function deposit() external payable;
        function payAll(uint256 start, uint256 limit) external;
        function withdrawFunds(uint256 amount) external;
    }
}
