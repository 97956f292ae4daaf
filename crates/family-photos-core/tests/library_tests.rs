use family_photos_core::storage::{
    Database, IdGenerator, OwnerDirectory, RecordStore, SequentialIds,
};
use family_photos_core::{Download, Error, FileStore, MediaLibrary, Upload};
use filetime::FileTime;
use std::fs;
use std::io::{Cursor, Read};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

struct Fixture {
    dir: TempDir,
    db: Arc<Database>,
    library: MediaLibrary,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        let library = MediaLibrary::new(
            FileStore::open(dir.path()).unwrap(),
            Arc::clone(&db) as Arc<dyn RecordStore>,
            Arc::clone(&db) as Arc<dyn OwnerDirectory>,
            Arc::new(SequentialIds::starting_after(0)) as Arc<dyn IdGenerator>,
        );
        Self { dir, db, library }
    }

    fn upload(&self, owner: i64, name: &str, folder: Option<&str>, bytes: &[u8]) -> family_photos_core::storage::Record {
        self.library
            .upload(
                owner,
                Upload {
                    file_name: name.to_string(),
                    created_at: 1_623_766_200_000,
                    folder: folder.map(str::to_string),
                },
                &mut Cursor::new(bytes.to_vec()),
            )
            .unwrap()
    }
}

#[test]
fn test_upload_stores_stamps_and_catalogs() {
    let fx = Fixture::new();
    let alice = fx.db.add_owner("alice", "Alice").unwrap();

    let record = fx.upload(alice.id, "C:\\phone\\IMG_1.jpg", Some("Trip"), b"jpeg");
    assert_eq!(record.name, "IMG_1.jpg");
    assert_eq!(record.folder.as_deref(), Some("Trip"));
    assert_eq!(record.file_size, 4);

    let path = fx.dir.path().join("alice/Trip/IMG_1.jpg");
    assert_eq!(fs::read(&path).unwrap(), b"jpeg");
    let modified = FileTime::from_last_modification_time(&fs::metadata(&path).unwrap());
    assert_eq!(modified.unix_seconds(), 1_623_766_200);

    assert_eq!(fx.db.record(record.id).unwrap(), Some(record));
}

#[test]
fn test_upload_with_taken_name_gets_suffix() {
    let fx = Fixture::new();
    let alice = fx.db.add_owner("alice", "Alice").unwrap();

    let first = fx.upload(alice.id, "IMG_1.jpg", None, b"one");
    let second = fx.upload(alice.id, "IMG_1.jpg", None, b"two");

    assert_eq!(first.name, "IMG_1.jpg");
    assert_ne!(second.name, first.name);
    assert!(second.name.starts_with("IMG_1-"));
    assert!(second.name.ends_with(".jpg"));
    assert_eq!(fs::read(fx.dir.path().join("alice/IMG_1.jpg")).unwrap(), b"one");
    assert_eq!(fx.library.list(alice.id).unwrap().len(), 2);
}

#[test]
fn test_upload_rejects_bad_input() {
    let fx = Fixture::new();
    let alice = fx.db.add_owner("alice", "Alice").unwrap();
    let upload = |name: &str, created_at: i64, folder: Option<&str>| {
        fx.library.upload(
            alice.id,
            Upload {
                file_name: name.to_string(),
                created_at,
                folder: folder.map(str::to_string),
            },
            &mut Cursor::new(b"x".to_vec()),
        )
    };

    assert!(matches!(upload("a.jpg", 0, None), Err(Error::InvalidTimestamp(0))));
    assert!(matches!(upload("a.jpg", 5, Some("..")), Err(Error::InvalidName(_))));
    assert!(matches!(upload("dir/..", 5, None), Err(Error::InvalidName(_))));
    assert!(matches!(
        fx.library.upload(
            999,
            Upload {
                file_name: "a.jpg".into(),
                created_at: 5,
                folder: None
            },
            &mut Cursor::new(Vec::new())
        ),
        Err(Error::NotFound(_))
    ));
    assert!(fx.library.list(alice.id).unwrap().is_empty());
}

#[test]
fn test_second_download_is_not_modified() {
    let fx = Fixture::new();
    let alice = fx.db.add_owner("alice", "Alice").unwrap();
    let record = fx.upload(alice.id, "a.jpg", None, b"picture");

    let first = fx.library.download(alice.id, record.id, None).unwrap();
    let etag = first.etag().to_string();
    let Download::Content { mut body, content_length, .. } = first else {
        panic!("first download must carry content");
    };
    let mut bytes = Vec::new();
    body.read_to_end(&mut bytes).unwrap();
    assert_eq!(bytes, b"picture");
    assert_eq!(content_length, 7);

    let second = fx.library.download(alice.id, record.id, Some(&etag)).unwrap();
    assert!(matches!(second, Download::NotModified { .. }));
    assert_eq!(fx.library.etags().len(), 1);
}

#[test]
fn test_foreign_record_is_not_found() {
    let fx = Fixture::new();
    let alice = fx.db.add_owner("alice", "Alice").unwrap();
    let bob = fx.db.add_owner("bob", "Bob").unwrap();
    let record = fx.upload(alice.id, "a.jpg", None, b"a");

    assert!(matches!(
        fx.library.download(bob.id, record.id, None),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        fx.library.delete(bob.id, record.id),
        Err(Error::NotFound(_))
    ));
    assert!(fx.dir.path().join("alice/a.jpg").exists());
}

#[test]
fn test_delete_removes_file_and_record() {
    let fx = Fixture::new();
    let alice = fx.db.add_owner("alice", "Alice").unwrap();
    let kept = fx.upload(alice.id, "a.jpg", None, b"a");
    let gone = fx.upload(alice.id, "b.jpg", None, b"b");

    fx.library.delete(alice.id, gone.id).unwrap();
    assert!(!fx.dir.path().join("alice/b.jpg").exists());
    assert_eq!(fx.library.list(alice.id).unwrap(), vec![kept]);
}

#[test]
fn test_delete_with_missing_file_still_drops_record() {
    let fx = Fixture::new();
    let alice = fx.db.add_owner("alice", "Alice").unwrap();
    let record = fx.upload(alice.id, "a.jpg", None, b"a");
    fs::remove_file(fx.dir.path().join("alice/a.jpg")).unwrap();

    fx.library.delete(alice.id, record.id).unwrap();
    assert_eq!(fx.db.record(record.id).unwrap(), None);
}

#[test]
fn test_relocate_moves_file_and_record() {
    let fx = Fixture::new();
    let alice = fx.db.add_owner("alice", "Alice").unwrap();
    let public = fx.db.add_owner("public", "Everyone").unwrap();
    let record = fx.upload(alice.id, "a.jpg", Some("Trip"), b"a");

    let moved = fx
        .library
        .relocate(alice.id, record.id, public.id, Some("Shared".into()))
        .unwrap();
    assert_eq!(moved.owner, public.id);
    assert_eq!(moved.full_name(), "Shared/a.jpg");
    assert_eq!(moved.created_at, record.created_at);
    assert!(!fx.dir.path().join("alice/Trip/a.jpg").exists());
    assert!(fx.dir.path().join("public/Shared/a.jpg").exists());
    assert_eq!(fx.db.record(record.id).unwrap(), Some(moved));
}

#[test]
fn test_relocate_refuses_occupied_target() {
    let fx = Fixture::new();
    let alice = fx.db.add_owner("alice", "Alice").unwrap();
    let bob = fx.db.add_owner("bob", "Bob").unwrap();
    let record = fx.upload(alice.id, "a.jpg", None, b"alice");
    fx.upload(bob.id, "a.jpg", None, b"bob");

    assert!(matches!(
        fx.library.relocate(alice.id, record.id, bob.id, None),
        Err(Error::Conflict(_))
    ));
    assert_eq!(fs::read(fx.dir.path().join("alice/a.jpg")).unwrap(), b"alice");
    assert_eq!(fs::read(fx.dir.path().join("bob/a.jpg")).unwrap(), b"bob");
    assert_eq!(fx.db.record(record.id).unwrap().unwrap().owner, alice.id);
}

#[test]
fn test_concurrent_uploads_of_one_name_never_overwrite() {
    let fx = Fixture::new();
    let alice = fx.db.add_owner("alice", "Alice").unwrap();

    let records: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let fx = &fx;
                scope.spawn(move || (i, fx.upload(alice.id, "IMG_1.jpg", None, &[i; 32])))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut names: Vec<&str> = records.iter().map(|(_, r)| r.name.as_str()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 8);
    for (i, record) in &records {
        let stored = fs::read(fx.dir.path().join("alice").join(&record.name)).unwrap();
        assert_eq!(stored, vec![*i; 32]);
    }
    assert_eq!(fx.library.list(alice.id).unwrap().len(), 8);
}

#[test]
fn test_upload_skips_name_present_only_on_disk() {
    let fx = Fixture::new();
    let alice = fx.db.add_owner("alice", "Alice").unwrap();
    fs::create_dir_all(fx.dir.path().join("alice")).unwrap();
    fs::write(fx.dir.path().join("alice/IMG_1.jpg"), b"unscanned").unwrap();

    let record = fx.upload(alice.id, "IMG_1.jpg", None, b"new");
    assert_ne!(record.name, "IMG_1.jpg");
    assert_eq!(
        fs::read(fx.dir.path().join("alice/IMG_1.jpg")).unwrap(),
        b"unscanned"
    );
}

#[test]
fn test_exif_of_a_plain_file_is_empty() {
    let fx = Fixture::new();
    let alice = fx.db.add_owner("alice", "Alice").unwrap();
    let bob = fx.db.add_owner("bob", "Bob").unwrap();
    let record = fx.upload(alice.id, "IMG_1.jpg", None, b"no headers here");

    assert!(fx.library.exif(alice.id, record.id).unwrap().is_empty());
    assert!(matches!(
        fx.library.exif(bob.id, record.id),
        Err(Error::NotFound(_))
    ));

    fs::remove_file(fx.dir.path().join("alice/IMG_1.jpg")).unwrap();
    assert!(matches!(
        fx.library.exif(alice.id, record.id),
        Err(Error::NotFound(_))
    ));
}
