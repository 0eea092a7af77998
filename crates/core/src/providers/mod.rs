pub mod traits;

// Simulated sources and generators
pub mod market;
pub mod mock_data;
pub mod seeded;
