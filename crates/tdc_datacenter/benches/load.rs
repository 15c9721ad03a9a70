use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn get_input() -> Vec<u8> {
    let mut dc = tdc_datacenter::DataCenter::create();
    let mut root = dc.root_mut();

    for id in 0..2000 {
        let mut item = root.create_child("ItemData").unwrap();
        item.add_attribute("id", id).unwrap();
        item.add_attribute("name", format!("item_{id}")).unwrap();
        item.add_attribute("weight", id as f32 / 3.0).unwrap();
        item.create_child("Stat")
            .unwrap()
            .set_value(Some("a longer description shared by many nodes"))
            .unwrap();
    }

    let mut buffer = Vec::new();
    dc.save(&mut buffer, &tdc_datacenter::SaveOptions::default())
        .unwrap();
    buffer
}

pub mod read {
    use divan::Bencher;
    use tdc_datacenter::{DataCenter, LoadOptions, LoaderMode, Mutability};

    fn load(bencher: Bencher, mode: LoaderMode, strict: bool) {
        let options = LoadOptions::builder()
            .mode(mode)
            .mutability(Mutability::Immutable)
            .strict(strict)
            .build();

        bencher.with_inputs(super::get_input).bench_refs(|data| {
            divan::black_box(DataCenter::load(&data[..], &options).unwrap());
        });
    }

    #[divan::bench]
    fn transient(bencher: Bencher) {
        load(bencher, LoaderMode::Transient, false);
    }

    #[divan::bench]
    fn lazy(bencher: Bencher) {
        load(bencher, LoaderMode::Lazy, false);
    }

    #[divan::bench]
    fn eager(bencher: Bencher) {
        load(bencher, LoaderMode::Eager, false);
    }

    #[divan::bench]
    fn eager_strict(bencher: Bencher) {
        load(bencher, LoaderMode::Eager, true);
    }

    #[divan::bench(sample_count = 10)]
    fn walk_lazy(bencher: Bencher) {
        let input = super::get_input();
        let options = LoadOptions::builder().mode(LoaderMode::Lazy).build();

        bencher.bench_local(move || {
            let dc = DataCenter::load(&input[..], &options).unwrap();
            let count: usize = dc.root().children().map(|c| c.attribute_count()).sum();
            divan::black_box(count);
        });
    }
}

pub mod write {
    use divan::Bencher;
    use tdc_datacenter::{DataCenter, LoadOptions, SaveOptions};

    #[divan::bench(sample_count = 10)]
    fn save(bencher: Bencher) {
        let dc = DataCenter::load(&super::get_input()[..], &LoadOptions::default()).unwrap();

        bencher.bench_local(move || {
            let mut buffer = Vec::new();
            dc.save(&mut buffer, &SaveOptions::default()).unwrap();
            divan::black_box(buffer);
        });
    }
}
