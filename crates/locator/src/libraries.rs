use std::path::Path;

/// File name prefixes of libraries shipped with the host runtime. Classpath
/// roots matching one of them are never scanned.
pub const DEFAULT_LIBRARY_PREFIXES: &[&str] = &[
    "launchwrapper-",
    "asm-all-",
    "akka-actor_2.11-",
    "config-",
    "scala-",
    "jopt-simple-",
    "lzma-",
    "realms-",
    "httpclient-",
    "httpcore-",
    "vecmath-",
    "trove4j-",
    "icu4j-core-mojang-",
    "codecjorbis-",
    "codecwav-",
    "libraryjavawound-",
    "librarylwjglopenal-",
    "soundsystem-",
    "netty-all-",
    "guava-",
    "commons-lang3-",
    "commons-compress-",
    "commons-logging-",
    "commons-io-",
    "commons-codec-",
    "jinput-",
    "jutils-",
    "gson-",
    "authlib-",
    "log4j-api-",
    "log4j-core-",
    "lwjgl-",
    "lwjgl_util-",
    "twitch-",
    "jline-",
    "jna-",
    "platform-",
    "oshi-core-",
    "netty-",
    "libraryjavasound-",
    "fastutil-",
    "lombok-",
];

/// Whether `path` is a library of the host runtime.
///
/// Anything under `runtime_home` counts, as does an archive (by `extension`)
/// whose file name starts with one of `prefixes`.
pub fn is_default_library<S: AsRef<str>>(
    path: &Path,
    runtime_home: Option<&Path>,
    prefixes: &[S],
    extension: &str,
) -> bool {
    if runtime_home.is_some_and(|home| path.starts_with(home)) {
        return true;
    }
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    if !has_extension(&name, extension) {
        return false;
    }
    prefixes.iter().any(|p| name.starts_with(p.as_ref()))
}

pub(crate) fn has_extension(name: &str, extension: &str) -> bool {
    name.len() > extension.len() + 1
        && name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_prefixes_and_runtime_home() {
        let home = Path::new("/opt/runtime");
        assert!(is_default_library(
            Path::new("/libs/guava-17.0.jar"),
            None,
            DEFAULT_LIBRARY_PREFIXES,
            "jar"
        ));
        assert!(!is_default_library(
            Path::new("/libs/guava-17.0.txt"),
            None,
            DEFAULT_LIBRARY_PREFIXES,
            "jar"
        ));
        assert!(is_default_library(
            Path::new("/opt/runtime/lib/rt.jar"),
            Some(home),
            DEFAULT_LIBRARY_PREFIXES,
            "jar"
        ));
        assert!(!is_default_library(
            Path::new("/libs/myplugin-1.0.jar"),
            Some(home),
            DEFAULT_LIBRARY_PREFIXES,
            "jar"
        ));
    }

    #[test]
    fn extension_check() {
        assert!(has_extension("a.JAR", "jar"));
        assert!(!has_extension(".jar", "jar"));
        assert!(!has_extension("a.jar.zip", "jar"));
    }
}
