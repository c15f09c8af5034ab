// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Worker command lines for each data movement.
//!
//! Workers always see the volume at [`VOLUME_MOUNT`] and, when a host path is
//! involved, the host directory at [`HOST_MOUNT`].

pub const VOLUME_MOUNT: &str = "/vackup-volume";
pub const HOST_MOUNT: &str = "/vackup";
/// Directory inside a saved image holding the volume contents.
pub const IMAGE_DATA_DIR: &str = "/volume-data";
pub const CLONE_SOURCE_MOUNT: &str = "/from";
pub const CLONE_TARGET_MOUNT: &str = "/to";

/// Top-level directory of archives written before exports were rooted at the
/// volume contents.
pub const LEGACY_ARCHIVE_ROOT: &str = "vackup-volume";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
    Bzip2,
}

impl Compression {
    pub fn from_file_name(file_name: &str) -> Self {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".gz") || lower.ends_with(".tgz") {
            Compression::Gzip
        } else if lower.ends_with(".zst") || lower.ends_with(".tzst") {
            Compression::Zstd
        } else if lower.ends_with(".bz2") || lower.ends_with(".tbz2") {
            Compression::Bzip2
        } else {
            Compression::None
        }
    }

    /// Shell fragment making the codec's binary available. Alpine ships gzip
    /// and bzip2 in busybox but not zstd.
    fn ensure_tool(&self) -> Option<&'static str> {
        match self {
            Compression::Zstd => Some("command -v zstd >/dev/null 2>&1 || apk add --no-cache -q zstd >/dev/null"),
            _ => None,
        }
    }

    fn compress_filter(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some("gzip -c"),
            Compression::Zstd => Some("zstd -T0 -q -c"),
            Compression::Bzip2 => Some("bzip2 -c"),
        }
    }

    fn decompress_filter(&self) -> &'static str {
        match self {
            Compression::None => "cat",
            Compression::Gzip => "gzip -dc",
            Compression::Zstd => "zstd -dc",
            Compression::Bzip2 => "bzip2 -dc",
        }
    }
}

/// Quotes `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Shell fragment removing every entry of `dir`, dot-files included.
///
/// `..?*` matches names starting with `..` other than `..` itself, `.[!.]*`
/// matches other dot-files, `*` the rest.
pub fn clear_directory(dir: &str) -> String {
    format!("rm -rf {dir}/..?* {dir}/.[!.]* {dir}/*")
}

/// Writes the volume contents to `HOST_MOUNT/<file_name>`, rooted at the
/// volume so extraction reproduces its top level directly.
pub fn export_command(file_name: &str) -> String {
    let target = shell_quote(&format!("{}/{}", HOST_MOUNT, file_name));
    let compression = Compression::from_file_name(file_name);
    let archive = match compression.compress_filter() {
        Some(filter) => format!("tar -C {VOLUME_MOUNT} -cvf - . | {filter} > {target}"),
        None => format!("tar -C {VOLUME_MOUNT} -cvf {target} ."),
    };
    match compression.ensure_tool() {
        Some(ensure) => format!("set -e; set -o pipefail; {ensure}; {archive}"),
        None if compression.compress_filter().is_some() => format!("set -o pipefail; {archive}"),
        None => archive,
    }
}

/// Replaces the volume contents with the archive at `HOST_MOUNT/<file_name>`.
///
/// The archive must be readable and list cleanly before anything in the
/// volume is removed. Archives whose first entry is the legacy wrapper
/// directory get one leading path component stripped.
pub fn import_command(file_name: &str) -> String {
    let source = shell_quote(&format!("{}/{}", HOST_MOUNT, file_name));
    let compression = Compression::from_file_name(file_name);
    let decompress = compression.decompress_filter();
    let ensure = compression
        .ensure_tool()
        .map(|ensure| format!("{ensure}; "))
        .unwrap_or_default();
    format!(
        "set -e; set -o pipefail; {ensure}\
         [ -r {source} ] || {{ echo \"cannot read archive {source}\" >&2; exit 1; }}; \
         entries=$({decompress} < {source} | tar -tf -); \
         [ -n \"$entries\" ] || {{ echo \"archive {source} is empty or unreadable\" >&2; exit 1; }}; \
         first=$(printf '%s\\n' \"$entries\" | sed -n 1p); \
         strip=0; \
         case \"$first\" in {legacy}|{legacy}/*|./{legacy}|./{legacy}/*) strip=1 ;; esac; \
         {clear}; \
         {decompress} < {source} | tar -xvf - -C {VOLUME_MOUNT} --strip-components=$strip",
        clear = clear_directory(VOLUME_MOUNT),
        legacy = LEGACY_ARCHIVE_ROOT,
    )
}

/// Copies the volume into the worker's own filesystem for a later commit.
pub fn save_command() -> String {
    format!("mkdir -p {IMAGE_DATA_DIR} && cp -Rp {VOLUME_MOUNT}/. {IMAGE_DATA_DIR}/")
}

/// Replaces the volume contents with the image's saved data directory.
pub fn load_command() -> String {
    format!(
        "{} && cp -Rp {IMAGE_DATA_DIR}/. {VOLUME_MOUNT}/",
        clear_directory(VOLUME_MOUNT)
    )
}

pub fn clone_command() -> String {
    format!("cd {CLONE_SOURCE_MOUNT} && cp -av . {CLONE_TARGET_MOUNT}")
}

pub fn empty_command() -> String {
    clear_directory(VOLUME_MOUNT)
}

/// Depth-0 disk usage of `<volumes_root>/<segment>`; the segment is `*` or a
/// validated volume name, so it is left unquoted for globbing.
pub fn disk_usage_command(volumes_root: &str, segment: &str) -> String {
    format!("du -d 0 {}/{}", volumes_root.trim_end_matches('/'), segment)
}

/// Normalizes a host destination directory for a bind mount.
///
/// Windows paths such as `C:\\Users\\me` become `/C/Users/me`; POSIX paths are
/// returned unchanged.
pub fn normalize_host_path(path: &str) -> String {
    let bytes = path.as_bytes();
    let is_windows_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if !is_windows_drive {
        return path.to_string();
    }

    let rest = path[2..].replace("\\\\", "/").replace('\\', "/");
    let rest = rest.trim_start_matches('/');
    format!("/{}/{}", &path[..1], rest)
}
