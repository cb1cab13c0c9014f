//! `sdkv-admin` is a command-driven demo/smoke-test harness for the gateway
//! core. It holds no real backing store: every invocation builds a fresh
//! [`InMemoryStore`] and replays a small script of account/bucket/object
//! commands against it, printing each result.
//!
//! Useful for exercising the placement algorithms by hand; not a
//! replacement for a real deployment, which would wire the same core
//! against an actual block-object backing store.

use std::collections::HashMap;
use std::env;
use std::io::{self, BufRead, Write};
use std::process::exit;
use std::time::{SystemTime, UNIX_EPOCH};

use sdkv::account::{create_account, delete_account, list_buckets, read_account};
use sdkv::bucket::{create_bucket, delete_bucket, lookup_bucket};
use sdkv::error::Error;
use sdkv::inode::Inode;
use sdkv::limits::GatewayLimits;
use sdkv::oalloc::Allocator;
use sdkv::object::{create_object, delete_object, list_objects, read_object};
use sdkv::store::ObjectStore;
use sdkv::testutil::{BufferSink, InMemoryStore};

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
    /// The name of the current program used in command line.
    prog: String,
    /// If true, print command line help.
    help: bool,
    /// Script file to read commands from; stdin if absent.
    script: Option<String>,
}

fn parse_args() -> Args {
    let mut args: Args = Default::default();
    let mut iter = env::args();
    args.prog = iter.next().unwrap_or_else(|| "sdkv-admin".to_owned());

    for arg in iter {
        match arg.as_str() {
            "-h" | "--help" => args.help = true,
            _ => args.script = Some(arg),
        }
    }
    args
}

/// Prints command usage.
fn print_usage(prog: &str) {
    eprintln!("{prog}: bad usage");
    eprintln!("Try '{prog} --help' for more information.");
}

/// Prints command help.
fn print_help(prog: &str) {
    println!();
    println!("Usage:");
    println!(" {prog} [options] [script-file]");
    println!();
    println!("Replays account/bucket/object commands against a fresh in-memory store.");
    println!("Reads from script-file, or from stdin if omitted.");
    println!();
    println!("Commands (one per line):");
    println!(" create-account <account>");
    println!(" delete-account <account>");
    println!(" load-account <account>            reload a persisted account's inode into the cache");
    println!(" create-bucket <account> <bucket>");
    println!(" delete-bucket <account> <bucket>");
    println!(" list-buckets <account>");
    println!(" stat <account>                     count of live buckets");
    println!(" put-object <account> <bucket> <name> <value>");
    println!(" get-object <account> <bucket> <name>");
    println!(" delete-object <account> <bucket> <name>");
    println!(" list-objects <account> <bucket>");
    println!();
    println!("Options:");
    println!(" -h, --help\tPrints help.");
}

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Holds everything one script run needs: the backing store, the extent
/// allocator, the scale parameters, and a cache of loaded account inodes
/// (bucket operations mutate an inode in place and expect the caller to
/// keep it around between calls).
struct Session {
    store: InMemoryStore,
    allocator: Allocator,
    limits: GatewayLimits,
    accounts: HashMap<String, Inode>,
}

impl Session {
    fn new() -> Self {
        Session {
            store: InMemoryStore::new(),
            allocator: Allocator::new(),
            limits: GatewayLimits::default(),
            accounts: HashMap::new(),
        }
    }

    fn lookup_bucket_volumes(&self, account: &str, bucket: &str) -> Result<(u32, u32), String> {
        let onode_vid = lookup_bucket(account, bucket, &self.store).map_err(|e| e.to_string())?;
        let data_vid = self
            .store
            .lookup_volume_by_name(&format!("{account}/{bucket}/allocator"))
            .map_err(|_| "bucket has no data volume".to_string())?;
        Ok((onode_vid, data_vid))
    }

    /// Executes one command line, printing its outcome. Returns `Err` only
    /// for a malformed command line; backend errors are printed and
    /// otherwise swallowed so a script can keep going.
    fn run(&mut self, line: &str) -> Result<(), String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let (cmd, rest) = match words.split_first() {
            Some((cmd, rest)) => (*cmd, rest),
            None => return Ok(()),
        };

        match (cmd, rest) {
            ("create-account", [account]) => match create_account(account, now(), &mut self.store, &self.limits) {
                Ok(inode) => {
                    self.accounts.insert(account.to_string(), inode);
                    println!("created account {account}");
                }
                Err(e) => println!("create-account {account}: {e}"),
            },
            ("delete-account", [account]) => match delete_account(account, &mut self.store) {
                Ok(()) => {
                    self.accounts.remove(*account);
                    println!("deleted account {account}");
                }
                Err(e) => println!("delete-account {account}: {e}"),
            },
            ("load-account", [account]) => {
                let vid = match self.store.lookup_volume_by_name(account) {
                    Ok(vid) => vid,
                    Err(_) => {
                        println!("load-account {account}: {}", Error::NotFound);
                        return Ok(());
                    }
                };
                match sdkv::inode::load_inode(&self.store, vid, &self.limits) {
                    Ok(inode) => {
                        self.accounts.insert(account.to_string(), inode);
                        println!("loaded account {account}");
                    }
                    Err(e) => println!("load-account {account}: {e}"),
                }
            }
            ("create-bucket", [account, bucket]) => match self.accounts.get_mut(*account) {
                Some(inode) => match create_bucket(inode, bucket, &mut self.store, &mut self.allocator, &self.limits) {
                    Ok(()) => println!("created bucket {account}/{bucket}"),
                    Err(e) => println!("create-bucket {account}/{bucket}: {e}"),
                },
                None => println!("create-bucket: account {account} not loaded; run create-account or load-account first"),
            },
            ("delete-bucket", [account, bucket]) => match self.accounts.get_mut(*account) {
                Some(inode) => match delete_bucket(inode, bucket, &mut self.store, &self.limits) {
                    Ok(()) => println!("deleted bucket {account}/{bucket}"),
                    Err(e) => println!("delete-bucket {account}/{bucket}: {e}"),
                },
                None => println!("delete-bucket: account {account} not loaded; run create-account or load-account first"),
            },
            ("list-buckets", [account]) => match self.accounts.get(*account) {
                Some(inode) => {
                    let mut names = Vec::new();
                    match list_buckets(inode, &self.store, &self.limits, |n| names.push(n.to_string())) {
                        Ok(()) => {
                            for n in names {
                                println!("{n}");
                            }
                        }
                        Err(e) => println!("list-buckets {account}: {e}"),
                    }
                }
                None => println!("list-buckets: account {account} not loaded; run create-account or load-account first"),
            },
            ("stat", [account]) => match self.accounts.get(*account) {
                Some(inode) => match read_account(inode, &self.store, &self.limits) {
                    Ok(count) => println!("{account}: {count} bucket(s)"),
                    Err(e) => println!("stat {account}: {e}"),
                },
                None => println!("stat: account {account} not loaded; run create-account or load-account first"),
            },
            ("put-object", [account, bucket, name, value]) => {
                match self.lookup_bucket_volumes(account, bucket) {
                    Ok((onode_vid, data_vid)) => {
                        let mut sink = BufferSink::with_request_body(value.as_bytes());
                        let result = create_object(
                            onode_vid,
                            data_vid,
                            name,
                            &mut sink,
                            value.len() as u64,
                            now(),
                            &mut self.store,
                            &mut self.allocator,
                            &self.limits,
                        );
                        match result {
                            Ok(()) => println!("put {account}/{bucket}/{name}"),
                            Err(e) => println!("put-object {account}/{bucket}/{name}: {e}"),
                        }
                    }
                    Err(msg) => println!("put-object: {msg}"),
                }
            }
            ("get-object", [account, bucket, name]) => match self.lookup_bucket_volumes(account, bucket) {
                Ok((onode_vid, _)) => {
                    let mut sink = BufferSink::default();
                    match read_object(onode_vid, name, &self.store, &mut sink, &self.limits) {
                        Ok(()) => println!("{}", String::from_utf8_lossy(sink.response_body())),
                        Err(e) => println!("get-object {account}/{bucket}/{name}: {e}"),
                    }
                }
                Err(msg) => println!("get-object: {msg}"),
            },
            ("delete-object", [account, bucket, name]) => match self.lookup_bucket_volumes(account, bucket) {
                Ok((onode_vid, _)) => {
                    let mut sink = BufferSink::default();
                    match delete_object(onode_vid, name, &mut sink, &mut self.store, &mut self.allocator, &self.limits) {
                        Ok(()) => println!("deleted {account}/{bucket}/{name}"),
                        Err(e) => println!("delete-object {account}/{bucket}/{name}: {e}"),
                    }
                }
                Err(msg) => println!("delete-object: {msg}"),
            },
            ("list-objects", [account, bucket]) => match self.lookup_bucket_volumes(account, bucket) {
                Ok((onode_vid, _)) => {
                    let mut names = Vec::new();
                    match list_objects(onode_vid, &self.store, &self.limits, |n| names.push(n.to_string())) {
                        Ok(()) => {
                            for n in names {
                                println!("{n}");
                            }
                        }
                        Err(e) => println!("list-objects {account}/{bucket}: {e}"),
                    }
                }
                Err(msg) => println!("list-objects: {msg}"),
            },
            _ => return Err(format!("unrecognized command: {line}")),
        }
        Ok(())
    }
}

fn run_script(lines: impl Iterator<Item = io::Result<String>>) -> i32 {
    let mut session = Session::new();
    let mut status = 0;
    for line in lines {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("sdkv-admin: read error: {e}");
                return 1;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Err(msg) = session.run(trimmed) {
            eprintln!("sdkv-admin: {msg}");
            status = 1;
        }
    }
    status
}

fn main() {
    let args = parse_args();

    if args.help {
        print_help(&args.prog);
        exit(0);
    }

    let status = match &args.script {
        Some(path) => match std::fs::File::open(path) {
            Ok(file) => run_script(io::BufReader::new(file).lines()),
            Err(e) => {
                eprintln!("{}: cannot open {}: {}", args.prog, path, e);
                print_usage(&args.prog);
                exit(1);
            }
        },
        None => run_script(io::stdin().lock().lines()),
    };

    io::stdout().flush().ok();
    exit(status);
}
