//! Memory profiles for choosing the output buffer size

use crate::writer::WriterOptions;

/// Memory profile for different deployment sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryProfile {
    /// Small containers (< 512MB): 16KB buffer
    Low,
    /// Medium containers (512MB-1GB): 64KB buffer
    Medium,
    /// Large containers (> 1GB): 256KB buffer
    High,
    /// Custom buffer size in bytes
    Custom { buffer_size: usize },
}

impl MemoryProfile {
    /// Pick a profile from a memory limit in MB
    pub fn from_memory_mb(memory_mb: usize) -> Self {
        if memory_mb < 512 {
            MemoryProfile::Low
        } else if memory_mb < 1024 {
            MemoryProfile::Medium
        } else {
            MemoryProfile::High
        }
    }

    /// Detect from the MEMORY_LIMIT_MB environment variable
    pub fn from_env() -> Self {
        std::env::var("MEMORY_LIMIT_MB")
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .map(Self::from_memory_mb)
            .unwrap_or(MemoryProfile::High)
    }

    /// Capacity of the XML output buffer
    pub fn buffer_capacity(&self) -> usize {
        match self {
            MemoryProfile::Low => 16 * 1024,
            MemoryProfile::Medium => 64 * 1024,
            MemoryProfile::High => 256 * 1024,
            MemoryProfile::Custom { buffer_size } => *buffer_size,
        }
    }

    /// Writer options using this profile's buffer size
    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions::new().with_memory_profile(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_profile_from_mb() {
        assert_eq!(MemoryProfile::from_memory_mb(256), MemoryProfile::Low);
        assert_eq!(MemoryProfile::from_memory_mb(768), MemoryProfile::Medium);
        assert_eq!(MemoryProfile::from_memory_mb(2048), MemoryProfile::High);
    }

    #[test]
    fn test_buffer_capacities() {
        assert_eq!(MemoryProfile::Low.buffer_capacity(), 16 * 1024);
        assert_eq!(
            MemoryProfile::Custom { buffer_size: 4096 }.buffer_capacity(),
            4096
        );
        assert_eq!(
            MemoryProfile::Medium.writer_options().buffer_capacity(),
            64 * 1024
        );
    }
}
