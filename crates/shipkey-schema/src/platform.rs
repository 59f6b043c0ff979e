//! Platform and architecture names as understood by the release API.
//!
//! The server uses Go-style names (`darwin`, `amd64`), so Rust target
//! constants are translated here.

/// Operating system name of the running binary.
pub fn current_platform() -> &'static str {
    platform_name(std::env::consts::OS)
}

/// CPU architecture name of the running binary.
pub fn current_arch() -> &'static str {
    arch_name(std::env::consts::ARCH)
}

fn platform_name(os: &'static str) -> &'static str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn arch_name(arch: &'static str) -> &'static str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation() {
        assert_eq!(platform_name("macos"), "darwin");
        assert_eq!(platform_name("linux"), "linux");
        assert_eq!(arch_name("x86_64"), "amd64");
        assert_eq!(arch_name("aarch64"), "arm64");
        assert_eq!(arch_name("riscv64"), "riscv64");
    }
}
