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
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let loader = Loader::new(Batcher).cached();
    rt.block_on(async {
        let (a, b) = futures::future::join(loader.load(3), loader.load(4)).await;
        assert_eq!((Ok(30), Ok(40)), (a, b));

        let many = loader.try_load_many(vec![3, 4, 5]).await.unwrap();
        assert_eq!(vec![30, 40, 50], many);
    });
}
