pub mod mock_servers;
