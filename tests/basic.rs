mod common;

use chainfs::{BlockDevice, CurrentDir, Error, FatEntry, Mode, DIR_ENTRY_COUNT, MAX_NAME, ROOT_DIR_BLOCK};
use common::{fresh_fs, raw_block};

#[test]
fn test_format_lists_empty_root() {
    let fs = fresh_fs();
    assert!(fs.list_directory("/").unwrap().is_empty());
    assert!(fs.list_directory(".").unwrap().is_empty());
    assert_eq!(fs.current_directory(), &CurrentDir::AtRoot);
    assert_eq!(fs.current_dir_name(), "root");
    assert_eq!(fs.current_path().unwrap(), "/");

    let signature = raw_block(&fs, 0);
    assert!(signature.starts_with(chainfs::DISK_SIGNATURE));
    assert_eq!(fs.fat().get(ROOT_DIR_BLOCK), FatEntry::EndOfChain);
}

#[test]
fn test_make_directory_twice() {
    let mut fs = fresh_fs();
    fs.make_directory("/a").unwrap();
    let before = fs.list_directory("/").unwrap();
    let fat_before = fs.fat().clone();

    let result = fs.make_directory("/a");
    assert!(matches!(result, Err(Error::EntryAlreadyExists)));
    assert_eq!(fs.list_directory("/").unwrap(), before);
    assert_eq!(fs.fat(), &fat_before);
    log!("root after failed mkdir: {:?}", before);
}

#[test]
fn test_make_nested_directories() {
    let mut fs = fresh_fs();
    fs.make_directory("/a").unwrap();
    fs.make_directory("/a/b").unwrap();
    fs.make_directory("a/b/c").unwrap();
    assert_eq!(fs.list_directory("/").unwrap(), ["a"]);
    assert_eq!(fs.list_directory("/a").unwrap(), ["b"]);
    assert_eq!(fs.list_directory("./a/b").unwrap(), ["c"]);
    assert!(fs.list_directory("/a/b/c").unwrap().is_empty());

    assert!(matches!(fs.make_directory("/missing/x"), Err(Error::PathNotFound)));
    assert!(matches!(fs.list_directory("/missing"), Err(Error::EntryNotFound)));
    assert!(matches!(fs.list_directory("/missing/x"), Err(Error::PathNotFound)));
}

#[test]
fn test_name_too_long() {
    let mut fs = fresh_fs();
    let longest = "n".repeat(MAX_NAME - 1);
    fs.make_directory(&longest).unwrap();
    let too_long = "n".repeat(MAX_NAME);
    assert!(matches!(fs.make_directory(&too_long), Err(Error::NameTooLong)));
    assert!(matches!(fs.open(&too_long, Mode::Write), Err(Error::NameTooLong)));
    assert_eq!(fs.list_directory("/").unwrap(), [longest]);
}

#[test]
fn test_names_are_case_sensitive() {
    let mut fs = fresh_fs();
    fs.make_directory("Docs").unwrap();
    fs.make_directory("docs").unwrap();
    assert_eq!(fs.list_directory("/").unwrap(), ["Docs", "docs"]);
    assert!(matches!(fs.change_directory("DOCS"), Err(Error::EntryNotFound)));
}

#[test]
fn test_directory_full() {
    let mut fs = fresh_fs();
    for i in 0..DIR_ENTRY_COUNT {
        fs.make_directory(&format!("d{}", i)).unwrap();
    }
    let free_before = fs.free_blocks();
    assert!(matches!(fs.make_directory("one_more"), Err(Error::DirectoryFull)));
    assert!(matches!(fs.open("file", Mode::Write), Err(Error::DirectoryFull)));
    assert_eq!(fs.free_blocks(), free_before);

    // A removed entry's slot is reused.
    fs.remove_directory("d4").unwrap();
    fs.make_directory("one_more").unwrap();
    let names = fs.list_directory("/").unwrap();
    assert_eq!(names.len(), DIR_ENTRY_COUNT);
    assert_eq!(names[4], "one_more");
}

#[test]
fn test_remove_file_on_directory() {
    let mut fs = fresh_fs();
    fs.make_directory("/dir").unwrap();
    let fat_before = fs.fat().clone();
    assert!(matches!(fs.remove_file("/dir"), Err(Error::IsADirectory)));
    assert_eq!(fs.fat(), &fat_before);
    assert_eq!(fs.list_directory("/").unwrap(), ["dir"]);
}

#[test]
fn test_remove_file_releases_blocks() {
    let mut fs = fresh_fs();
    let data = common::pattern(3 * chainfs::BLOCK_SIZE);
    fs.write_file("/big", &data).unwrap();
    let first_block = fs.stat("/big").unwrap().first_block;
    let chain = fs.fat().chain(first_block).unwrap();
    assert_eq!(chain.len(), 3);
    let free_before = fs.free_blocks();

    fs.remove_file("/big").unwrap();
    assert!(fs.list_directory("/").unwrap().is_empty());
    assert_eq!(fs.free_blocks(), free_before + 3);
    for &block_id in &chain {
        assert_eq!(fs.fat().get(block_id), FatEntry::Unused);
        assert!(raw_block(&fs, block_id).iter().all(|&b| b == 0));
    }
    assert_eq!(fs.fat().find_free_block().unwrap(), *chain.iter().min().unwrap());

    assert!(matches!(fs.remove_file("/big"), Err(Error::EntryNotFound)));
    assert!(matches!(fs.remove_file("/nowhere/big"), Err(Error::PathNotFound)));
}

#[test]
fn test_remove_directory() {
    let mut fs = fresh_fs();
    fs.make_directory("/a").unwrap();
    fs.make_directory("/a/b").unwrap();
    fs.write_file("/a/f", b"x").unwrap();

    assert!(matches!(fs.remove_directory("/a"), Err(Error::DirectoryNotEmpty)));
    assert!(matches!(fs.remove_directory("/a/f"), Err(Error::NotADirectory)));
    assert!(matches!(fs.remove_directory("/a/zzz"), Err(Error::EntryNotFound)));
    assert!(matches!(fs.remove_directory("/q/zzz"), Err(Error::PathNotFound)));

    fs.remove_directory("/a/b").unwrap();
    fs.remove_file("/a/f").unwrap();
    let free_before = fs.free_blocks();
    fs.remove_directory("/a").unwrap();
    assert_eq!(fs.free_blocks(), free_before + 1);
    assert!(fs.list_directory("/").unwrap().is_empty());
}

#[test]
fn test_cannot_remove_current_directory() {
    let mut fs = fresh_fs();
    assert!(matches!(fs.remove_directory("/"), Err(Error::CannotRemoveCurrentDirectory)));

    fs.make_directory("/work").unwrap();
    fs.change_directory("/work").unwrap();
    assert!(matches!(fs.remove_directory("/work"), Err(Error::CannotRemoveCurrentDirectory)));
    assert!(matches!(fs.remove_directory("."), Err(Error::CannotRemoveCurrentDirectory)));
    assert!(matches!(fs.remove_directory("/"), Err(Error::DirectoryNotEmpty)));

    fs.change_directory("/").unwrap();
    fs.remove_directory("work").unwrap();
}

#[test]
fn test_change_directory() {
    let mut fs = fresh_fs();
    fs.make_directory("/a").unwrap();
    fs.make_directory("/a/b").unwrap();

    fs.change_directory("/a/b").unwrap();
    assert_eq!(fs.current_dir_name(), "b");
    assert_eq!(fs.current_path().unwrap(), "/a/b");
    match fs.current_directory() {
        CurrentDir::At(handle) => {
            assert!(handle.entry.is_dir);
            assert_eq!(handle.entry.first_block, handle.block);
        }
        CurrentDir::AtRoot => panic!("expected to be inside /a/b"),
    }

    // Relative paths now start at /a/b.
    fs.make_directory("c").unwrap();
    assert_eq!(fs.list_directory("/a/b").unwrap(), ["c"]);
    assert_eq!(fs.list_directory("..").unwrap(), ["b"]);
    assert_eq!(fs.list_directory("../b/../..").unwrap(), ["a"]);

    fs.change_directory("..").unwrap();
    assert_eq!(fs.current_path().unwrap(), "/a");
    fs.change_directory("b/c").unwrap();
    assert_eq!(fs.current_path().unwrap(), "/a/b/c");
    fs.change_directory("/").unwrap();
    assert_eq!(fs.current_directory(), &CurrentDir::AtRoot);

    fs.change_directory("a").unwrap();
    fs.change_directory("..").unwrap();
    assert_eq!(fs.current_directory(), &CurrentDir::AtRoot);
}

#[test]
fn test_change_directory_above_root() {
    let mut fs = fresh_fs();
    assert!(matches!(fs.change_directory(".."), Err(Error::CannotAscendAboveRoot)));
    assert_eq!(fs.current_directory(), &CurrentDir::AtRoot);

    fs.make_directory("/a").unwrap();
    fs.change_directory("/a").unwrap();
    let before = *fs.current_directory();
    assert!(matches!(fs.change_directory("../.."), Err(Error::CannotAscendAboveRoot)));
    assert!(matches!(fs.list_directory("/../a"), Err(Error::CannotAscendAboveRoot)));
    assert_eq!(fs.current_directory(), &before);
}

#[test]
fn test_change_directory_errors() {
    let mut fs = fresh_fs();
    fs.write_file("/file", b"data").unwrap();
    assert!(matches!(fs.change_directory("/file"), Err(Error::NotADirectory)));
    assert!(matches!(fs.change_directory("/nope"), Err(Error::EntryNotFound)));
    assert!(matches!(fs.change_directory("/nope/deeper"), Err(Error::PathNotFound)));
    assert!(matches!(fs.list_directory("/file"), Err(Error::NotADirectory)));
    assert!(matches!(fs.make_directory("/file/sub"), Err(Error::NotADirectory)));
    assert!(matches!(fs.change_directory(""), Err(Error::PathNotFound)));
    assert_eq!(fs.current_directory(), &CurrentDir::AtRoot);
}

#[test]
fn test_resolution_detail() {
    let mut fs = fresh_fs();
    fs.make_directory("/a").unwrap();
    fs.write_file("/a/f", b"hello").unwrap();

    let res = fs.resolve("/a/f").unwrap();
    assert!(res.dir_found);
    assert_eq!(res.dir_name, "a");
    assert_eq!(res.name, "f");
    let found = res.entry.unwrap();
    assert!(!found.entry.is_dir);
    assert_eq!(found.entry.file_length, 5);

    let res = fs.resolve("/a/g").unwrap();
    assert!(res.dir_found);
    assert!(res.entry.is_none());

    let res = fs.resolve("/x/y/z").unwrap();
    assert!(!res.dir_found);
    assert_eq!(res.dir_block, ROOT_DIR_BLOCK);
    assert_eq!(res.dir_name, "root");
    assert_eq!(res.name, "z");
    assert!(res.entry.is_none());

    let res = fs.resolve("/a/../a/f").unwrap();
    assert_eq!(res.dir_name, "a");
    assert!(res.entry.is_some());
}

#[test]
fn test_nul_in_name_rejected() {
    let mut fs = fresh_fs();
    fs.make_directory("/a").unwrap();
    let fat_before = fs.fat().clone();

    assert!(matches!(fs.make_directory("/a\0"), Err(Error::InvalidName)));
    assert!(matches!(fs.write_file("/x\0", b"hi"), Err(Error::InvalidName)));
    assert!(matches!(fs.open("/x\0y", Mode::Append), Err(Error::InvalidName)));
    assert_eq!(fs.list_directory("/").unwrap(), ["a"]);
    assert_eq!(fs.fat(), &fat_before);
    assert!(matches!(fs.read_file("/a\0"), Err(Error::EntryNotFound)));
}

#[test]
fn test_remove_with_broken_chain_keeps_entry() {
    let mut fs = fresh_fs();
    fs.write_file("/big", &common::pattern(2 * chainfs::BLOCK_SIZE)).unwrap();
    let first_block = fs.stat("/big").unwrap().first_block;
    let second = fs.fat().chain(first_block).unwrap()[1];
    assert!((second as usize) < chainfs::FAT_ENTRIES_PER_BLOCK);

    // Mark the second block of the chain unused behind the allocator's back.
    let device = fs.device();
    let mut fat_block = [0u8; chainfs::BLOCK_SIZE];
    device.read_block(chainfs::FAT_START, &mut fat_block).unwrap();
    let at = second as usize * chainfs::FAT_ENTRY_SIZE;
    fat_block[at..at + 2].copy_from_slice(&(-1i16).to_le_bytes());
    device.write_block(chainfs::FAT_START, &fat_block).unwrap();

    let mut mounted = chainfs::FileSystem::mount(device).unwrap();
    let fat_before = mounted.fat().clone();
    assert!(matches!(mounted.remove_file("/big"), Err(Error::Corrupted(_))));
    assert_eq!(mounted.list_directory("/").unwrap(), ["big"]);
    assert_eq!(mounted.fat(), &fat_before);
}
