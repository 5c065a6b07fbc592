use futures::executor::block_on;
use futures::{future, TryFutureExt as _};
use superloader::non_cached::Loader;
use superloader::{BatchFn, BatchOutcome};

struct Batcher;

impl BatchFn<i32, i32> for Batcher {
    type Error = ();

    async fn load(&mut self, keys: &[i32]) -> BatchOutcome<i32, ()> {
        println!("load batch {:?}", keys);
        Ok(keys.iter().map(|v| Ok(v * 10)).collect())
    }
}

fn main() {
    let loader = Loader::new(Batcher);
    println!("\n -- Using Loader --");
    {
        let v1 = loader
            .load(3)
            .and_then(|v| loader.try_load_many(vec![v, v + 5, v + 10]));
        let v2 = loader
            .load(4)
            .and_then(|v| loader.try_load_many(vec![v, v + 5, v + 10]));
        let output = block_on(future::try_join(v1, v2)).unwrap();
        let expected = (vec![300, 350, 400], vec![400, 450, 500]);
        assert_eq!(expected, output);
    }

    let ld = loader.cached();
    println!("\n -- Using Cached Loader --");
    {
        let v1 = ld
            .load(3)
            .and_then(|v| ld.try_load_many(vec![v, v + 5, v + 10]));
        let v2 = ld
            .load(4)
            .and_then(|v| ld.try_load_many(vec![v, v + 5, v + 10]));
        let output = block_on(future::try_join(v1, v2)).unwrap();
        let expected = (vec![300, 350, 400], vec![400, 450, 500]);
        assert_eq!(expected, output);
    }
}
