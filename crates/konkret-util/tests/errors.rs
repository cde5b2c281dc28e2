use konkret_util::errors::KonkretError;

#[test]
fn test_io_error_display() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
    let err = KonkretError::from(io_err);
    assert!(err.to_string().contains("I/O error"), "got: {err}");
}

#[test]
fn test_config_error_display() {
    let err = KonkretError::Config {
        message: "bad syntax".to_string(),
    };
    assert_eq!(err.to_string(), "Configuration error: bad syntax");
}

#[test]
fn test_no_valid_version_display() {
    let err = KonkretError::NoValidVersion {
        package: "zlib".to_string(),
        versions: "1.0:1.5".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "There are no valid versions for zlib that match '1.0:1.5'"
    );
}

#[test]
fn test_unavailable_compiler_without_arch() {
    let err = KonkretError::UnavailableCompilerVersion {
        compiler: "gcc@9".to_string(),
        arch: None,
    };
    assert_eq!(err.to_string(), "No compilers with spec gcc@9 found");
}

#[test]
fn test_unavailable_compiler_with_arch() {
    let err = KonkretError::UnavailableCompilerVersion {
        compiler: "gcc@9".to_string(),
        arch: Some(("ubuntu22".to_string(), "x86_64".to_string())),
    };
    assert_eq!(
        err.to_string(),
        "No compilers with spec gcc@9 found for operating system ubuntu22 and target x86_64"
    );
}

#[test]
fn test_no_compilers_for_arch_lists_available() {
    let err = KonkretError::NoCompilersForArch {
        os: "centos7".to_string(),
        target: "ppc64le".to_string(),
        available: "ubuntu22-x86_64".to_string(),
    };
    let s = err.to_string();
    assert!(s.contains("centos7"));
    assert!(s.contains("ubuntu22-x86_64"));
}

#[test]
fn test_no_build_display() {
    let err = KonkretError::NoBuild {
        package: "openssl".to_string(),
    };
    assert!(err.to_string().starts_with("The spec 'openssl' is configured as not buildable"));
}

#[test]
fn test_generic_error_display() {
    let err = KonkretError::Generic {
        message: "something broke".to_string(),
    };
    assert_eq!(err.to_string(), "something broke");
}

#[test]
fn test_io_error_from_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: KonkretError = io_err.into();
    assert!(matches!(err, KonkretError::Io(_)));
}
