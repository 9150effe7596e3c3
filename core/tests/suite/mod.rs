// Aggregates all integration tests as modules.

mod agent_stream;
mod pending_resolution;
