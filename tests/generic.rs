use futures::executor::block_on;
use superloader::non_cached::Loader;
use superloader::{BatchFn, BatchOutcome};

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct ObjectId(usize);

trait Model {
    fn load_many(keys: &[ObjectId]) -> Vec<Option<Self>>
    where
        Self: Sized;
}

#[derive(Debug, Clone, PartialEq)]
struct MyModel(usize);

impl Model for MyModel {
    fn load_many(keys: &[ObjectId]) -> Vec<Option<MyModel>> {
        keys.iter()
            .map(|k| if k.0 % 2 == 0 { Some(MyModel(k.0)) } else { None })
            .collect()
    }
}

pub struct ModelBatcher;

impl<T> BatchFn<ObjectId, Option<T>> for ModelBatcher
where
    T: Model,
{
    type Error = String;

    async fn load(&mut self, keys: &[ObjectId]) -> BatchOutcome<Option<T>, String> {
        Ok(T::load_many(keys).into_iter().map(Ok).collect())
    }
}

#[test]
fn test_generic() {
    let loader = Loader::new(ModelBatcher).cached();
    let f = loader.try_load_many(vec![ObjectId(1), ObjectId(4), ObjectId(2)]);
    let models: Vec<Option<MyModel>> = block_on(f).unwrap();
    assert_eq!(vec![None, Some(MyModel(4)), Some(MyModel(2))], models);
}
