use family_photos_core::{DeleteOutcome, Error, FileStore};
use filetime::FileTime;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tempfile::tempdir;

fn store_in(root: &Path) -> FileStore {
    FileStore::open(root.join("storage")).unwrap()
}

fn is_unsafe<T: std::fmt::Debug>(result: Result<T, Error>) -> bool {
    matches!(result, Err(Error::UnsafePath(_)))
}

#[test]
fn test_parent_components_are_rejected_everywhere() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let outside = dir.path().join("outside.jpg");
    fs::write(&outside, b"secret").unwrap();
    fs::write(store.root().join("inside.jpg"), b"mine").unwrap();

    let escape = "../outside.jpg";
    assert!(is_unsafe(store.resolve(escape)));
    assert!(is_unsafe(store.store(b"x", escape)));
    assert!(is_unsafe(store.store_from(&mut Cursor::new(b"x"), escape)));
    assert!(is_unsafe(store.move_file(escape, "stolen.jpg")));
    assert!(is_unsafe(store.move_file("inside.jpg", escape)));
    assert!(is_unsafe(store.delete(escape)));
    assert!(is_unsafe(store.exists(escape)));
    assert!(is_unsafe(store.set_timestamps(escape, 1_000)));
    assert!(is_unsafe(store.ensure_dir("a/../../b")));
    assert!(is_unsafe(store.open_file(escape)));
    assert!(is_unsafe(store.enumerate("..", 2)));
    assert!(is_unsafe(store.exists(outside.to_str().unwrap())));

    assert_eq!(fs::read(&outside).unwrap(), b"secret");
    assert!(store.root().join("inside.jpg").exists());
    assert!(!store.root().join("stolen.jpg").exists());
    assert!(!dir.path().join("b").exists());
}

#[test]
fn test_store_creates_parents_and_overwrites() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());

    let path = store.store(b"one", "alice/Trip/a.jpg").unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"one");
    store.store(b"two", "alice/Trip/a.jpg").unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"two");

    let written = store
        .store_from(&mut Cursor::new(vec![7u8; 4096]), "alice/b.jpg")
        .unwrap();
    assert_eq!(written, 4096);
    assert!(store.exists("alice/b.jpg").unwrap());
}

#[test]
fn test_move_file() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    store.store(b"pic", "alice/a.jpg").unwrap();

    store.move_file("alice/a.jpg", "bob/Shared/a.jpg").unwrap();
    assert!(!store.exists("alice/a.jpg").unwrap());
    assert_eq!(
        fs::read(store.root().join("bob/Shared/a.jpg")).unwrap(),
        b"pic"
    );

    assert!(matches!(
        store.move_file("alice/a.jpg", "alice/b.jpg"),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_move_refuses_occupied_target() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    store.store(b"first", "alice/a.jpg").unwrap();
    store.store(b"second", "bob/a.jpg").unwrap();

    assert!(matches!(
        store.move_file("alice/a.jpg", "bob/a.jpg"),
        Err(Error::Conflict(_))
    ));
    assert_eq!(fs::read(store.root().join("alice/a.jpg")).unwrap(), b"first");
    assert_eq!(fs::read(store.root().join("bob/a.jpg")).unwrap(), b"second");
}

#[test]
fn test_delete_reports_missing_files() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    store.store(b"pic", "alice/a.jpg").unwrap();

    assert_eq!(store.delete("alice/a.jpg").unwrap(), DeleteOutcome::Deleted);
    assert_eq!(store.delete("alice/a.jpg").unwrap(), DeleteOutcome::Missing);
}

#[test]
fn test_set_timestamps() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let path = store.store(b"pic", "alice/a.jpg").unwrap();

    store.set_timestamps("alice/a.jpg", 1_623_766_200_123).unwrap();
    let metadata = fs::metadata(&path).unwrap();
    let modified = FileTime::from_last_modification_time(&metadata);
    assert_eq!(modified.unix_seconds(), 1_623_766_200);

    assert!(matches!(
        store.set_timestamps("alice/a.jpg", 0),
        Err(Error::InvalidTimestamp(0))
    ));
    assert!(store.set_timestamps("alice/missing.jpg", 1_000).is_err());
}

#[test]
fn test_enumerate_respects_depth() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    store.store(b"1", "alice/a.jpg").unwrap();
    store.store(b"22", "alice/Trip/b.jpg").unwrap();
    store.store(b"333", "alice/Trip/Day1/c.jpg").unwrap();

    let mut found: Vec<(String, usize, u64)> = store
        .enumerate("alice", 2)
        .unwrap()
        .into_iter()
        .map(|f| (f.file_name, f.depth, f.size))
        .collect();
    found.sort();
    assert_eq!(
        found,
        vec![("a.jpg".to_string(), 1, 1), ("b.jpg".to_string(), 2, 2)]
    );

    assert!(store.enumerate("nobody", 2).unwrap().is_empty());
}

#[test]
fn test_open_missing_file_is_not_found() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    assert!(matches!(store.open_file("alice/a.jpg"), Err(Error::NotFound(_))));
}

#[test]
fn test_store_new_refuses_existing_file() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    store.store(b"original", "alice/a.jpg").unwrap();

    let mut incoming = Cursor::new(b"replacement".to_vec());
    assert!(matches!(
        store.store_new_from(&mut incoming, "alice/a.jpg"),
        Err(Error::Conflict(_))
    ));
    assert_eq!(incoming.position(), 0);
    assert_eq!(
        fs::read(store.root().join("alice/a.jpg")).unwrap(),
        b"original"
    );

    let written = store
        .store_new_from(&mut incoming, "alice/Trip/b.jpg")
        .unwrap();
    assert_eq!(written, 11);
    assert!(is_unsafe(
        store.store_new_from(&mut Cursor::new(b"x"), "../outside.jpg")
    ));
}

#[cfg(unix)]
#[test]
fn test_enumerate_skips_names_that_are_not_utf8() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    store.store(b"1", "alice/a.jpg").unwrap();
    let folder = store.root().join("alice");
    fs::write(folder.join(OsStr::from_bytes(b"caf\xe9.jpg")), b"2").unwrap();
    let odd_dir = folder.join(OsStr::from_bytes(b"Tr\xefp"));
    fs::create_dir_all(&odd_dir).unwrap();
    fs::write(odd_dir.join("b.jpg"), b"3").unwrap();

    let names: Vec<String> = store
        .enumerate("alice", 2)
        .unwrap()
        .into_iter()
        .map(|f| f.file_name)
        .collect();
    assert_eq!(names, vec!["a.jpg".to_string()]);
}
