use std::collections::HashMap;
use std::thread;

use futures::executor::block_on;
use superloader::non_cached::Loader;
use superloader::{batch_fn, LoadError};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let users: HashMap<u64, &'static str> = [(1, "ada"), (2, "grace"), (3, "linus")].into();

    let loader = Loader::new(batch_fn(move |ids: Vec<u64>| {
        println!("load batch {:?}", ids);
        let found: Vec<Result<&'static str, String>> = ids
            .iter()
            .map(|id| users.get(id).copied().ok_or(format!("no user {}", id)))
            .collect();
        futures::future::ready(Ok::<_, String>(found))
    }))
    .with_max_batch_size(2)
    .cached();

    let mut handles = Vec::new();
    for round in 0..2 {
        let loader = loader.clone();
        handles.push(thread::spawn(move || {
            let names = block_on(loader.load_many(vec![1, 2, 3, 4, 1]));
            println!("round {} -> {:?}", round, names);
            names
        }));
    }
    for handle in handles {
        let names = handle.join().unwrap();
        assert_eq!(Ok("ada"), names[0]);
        assert_eq!(Err(LoadError::Key("no user 4".to_string())), names[3]);
    }
}
