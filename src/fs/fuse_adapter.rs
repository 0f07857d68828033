//! The thin `fuser::Filesystem` shim: inode<->path bookkeeping plus kernel
//! callback bodies that call into `Projection` via `Handle::block_on` (the
//! `fuser` trait's methods are synchronous) and translate `FsError` into
//! `reply.error(errno)`. This is the one place in the crate that talks to
//! the kernel — see the module-level design note in `projection.rs`.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyWrite, Request};
use log::{debug, info, warn};
use tokio::runtime::Handle;

use crate::download::{DownloadQueue, ProcessSupervisor};
use crate::fs::attr::{NodeKind, Stat};
use crate::fs::router::{self, VNode};
use crate::fs::Projection;

const ROOT_INO: u64 = 1;
const TTL: Duration = Duration::from_secs(1);

struct InodeTable {
    next_ino: u64,
    path_to_ino: HashMap<String, u64>,
    ino_to_path: HashMap<u64, String>,
}

impl InodeTable {
    fn new() -> Self {
        let mut t = Self {
            next_ino: ROOT_INO + 1,
            path_to_ino: HashMap::new(),
            ino_to_path: HashMap::new(),
        };
        t.path_to_ino.insert("/".to_string(), ROOT_INO);
        t.ino_to_path.insert(ROOT_INO, "/".to_string());
        t
    }

    fn ensure(&mut self, path: &str) -> u64 {
        if let Some(ino) = self.path_to_ino.get(path) {
            return *ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.path_to_ino.insert(path.to_string(), ino);
        self.ino_to_path.insert(ino, path.to_string());
        ino
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.ino_to_path.get(&ino).cloned()
    }
}

pub struct FuseAdapter {
    projection: Projection,
    runtime: Handle,
    inodes: Mutex<InodeTable>,
    uid: u32,
    gid: u32,
    queue: DownloadQueue,
    supervisor: Arc<ProcessSupervisor>,
}

impl FuseAdapter {
    pub fn new(
        projection: Projection,
        runtime: Handle,
        uid: u32,
        gid: u32,
        queue: DownloadQueue,
        supervisor: Arc<ProcessSupervisor>,
    ) -> Self {
        Self {
            projection,
            runtime,
            inodes: Mutex::new(InodeTable::new()),
            uid,
            gid,
            queue,
            supervisor,
        }
    }

    fn path_for(&self, ino: u64) -> Option<String> {
        self.inodes.lock().expect("inode table lock").path_of(ino)
    }

    fn ino_for(&self, path: &str) -> u64 {
        self.inodes.lock().expect("inode table lock").ensure(path)
    }

    fn join(parent: &str, name: &str) -> String {
        if parent == "/" {
            format!("/{name}")
        } else {
            format!("{parent}/{name}")
        }
    }

    fn to_file_attr(&self, ino: u64, stat: &Stat) -> FileAttr {
        let kind = match stat.kind {
            NodeKind::Dir => FileType::Directory,
            NodeKind::File => FileType::RegularFile,
        };
        let type_bit = match stat.kind {
            NodeKind::Dir => libc::S_IFDIR,
            NodeKind::File => libc::S_IFREG,
        };
        FileAttr {
            ino,
            size: stat.size,
            blocks: stat.size.div_ceil(512),
            atime: secs_to_systemtime(stat.atime),
            mtime: secs_to_systemtime(stat.mtime),
            ctime: secs_to_systemtime(stat.ctime),
            crtime: secs_to_systemtime(stat.ctime),
            kind,
            perm: (type_bit as u32 | stat.perm) as u16,
            nlink: 1,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }
}

fn secs_to_systemtime(secs: f64) -> SystemTime {
    if secs >= 0.0 {
        UNIX_EPOCH + Duration::from_secs_f64(secs)
    } else {
        UNIX_EPOCH
    }
}

impl Filesystem for FuseAdapter {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(parent_path) = self.path_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str() else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = Self::join(&parent_path, name);

        match self.runtime.block_on(self.projection.getattr(&path)) {
            Ok(stat) => {
                let ino = self.ino_for(&path);
                reply.entry(&TTL, &self.to_file_attr(ino, &stat), 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.projection.getattr(&path)) {
            Ok(stat) => reply.attr(&TTL, &self.to_file_attr(ino, &stat)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(&mut self, _req: &Request, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        let entries = match self.runtime.block_on(self.projection.readdir(&path)) {
            Ok(e) => e,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };

        let mut all = vec![(ino, FileType::Directory, ".".to_string())];
        // parent inode is unknown from here in general; "." is sufficient for
        // correctness of `..`'s existence, not its exact target.
        all.push((ino, FileType::Directory, "..".to_string()));

        for name in entries {
            let child_path = Self::join(&path, &name);
            let node = router::classify(&child_path);
            let kind = match node {
                Some(VNode::ChannelDir { .. })
                | Some(VNode::ChannelsDir)
                | Some(VNode::TracksDir { .. })
                | Some(VNode::TagsDir { .. })
                | Some(VNode::TagDir { .. })
                | Some(VNode::FavoritesDir)
                | Some(VNode::DownloadsDir)
                | Some(VNode::FavoriteAliasRoot { .. })
                | Some(VNode::DownloadAliasRoot { .. })
                | Some(VNode::Root) => FileType::Directory,
                _ => FileType::RegularFile,
            };
            let child_ino = self.ino_for(&child_path);
            all.push((child_ino, kind, name));
        }

        for (i, (ino, kind, name)) in all.into_iter().enumerate().skip(offset as usize) {
            if reply.add(ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.projection.read(&path)) {
            Ok(bytes) => {
                let start = (offset as usize).min(bytes.len());
                let end = (start + size as usize).min(bytes.len());
                reply.data(&bytes[start..end]);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        _offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if router::classify(&path) != Some(VNode::Control) {
            reply.error(libc::EROFS);
            return;
        }
        match self.runtime.block_on(self.projection.write_control(data)) {
            Ok(()) => reply.written(data.len() as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!("setattr on ino {ino} rejected: read-only filesystem");
        reply.error(libc::EROFS);
    }

    fn open(&mut self, _req: &Request, _ino: u64, _flags: i32, reply: fuser::ReplyOpen) {
        reply.opened(0, 0);
    }

    fn opendir(&mut self, _req: &Request, _ino: u64, _flags: i32, reply: fuser::ReplyOpen) {
        reply.opened(0, 0);
    }

    fn mkdir(&mut self, _req: &Request, _parent: u64, _name: &OsStr, _mode: u32, _umask: u32, reply: ReplyEntry) {
        reply.error(libc::EROFS);
    }

    fn unlink(&mut self, _req: &Request, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(libc::EROFS);
    }

    fn rmdir(&mut self, _req: &Request, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(libc::EROFS);
    }

    fn rename(
        &mut self,
        _req: &Request,
        _parent: u64,
        _name: &OsStr,
        _newparent: u64,
        _newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        reply.error(libc::EROFS);
    }

    /// `fuser` invokes this once, right before `mount2` returns, whether the
    /// unmount was requested in-process or triggered externally (e.g. a
    /// separate `r4fs unmount` invocation running `fusermount -u`). Running
    /// §5's cooperative shutdown here — not just in the `ctrl_c` handler —
    /// is what makes an externally-triggered unmount still drain the queue
    /// and kill any in-flight subprocess instead of leaving it orphaned.
    fn destroy(&mut self) {
        info!("fuse destroy callback: running cooperative shutdown");
        self.runtime.block_on(async {
            self.supervisor.cancel().await;
            self.queue.shutdown().await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        });
    }
}
