use pretty_assertions::assert_eq;
use tdc_datacenter::{
    error::{Error, Result},
    CompressionMethod, DataCenter, DataCenterKeys, DataCenterValue, LoadOptions, LoaderMode,
    Mutability, SaveOptions,
};
use tdc_datacenter::{Architecture, KeyPair};
use tracing::info;
use tracing_test::traced_test;

fn build_sample() -> Result<DataCenter> {
    let mut dc = DataCenter::create();
    let mut root = dc.root_mut();

    for id in 0..20 {
        let mut item = root.create_child("ItemData")?;
        item.set_keys(DataCenterKeys::new(["id"])?)?;
        item.add_attribute("id", id)?;
        item.add_attribute("name", format!("item {id}"))?;
        item.add_attribute("weight", id as f32 * 0.5)?;
        item.add_attribute("tradable", id % 2 == 0)?;

        let mut stat = item.create_child("Stat")?;
        stat.add_attribute("kind", "attack")?;
        stat.set_value(Some("description text"))?;
    }

    let mut strings = root.create_child("StrSheet")?;
    for index in 0..50 {
        strings
            .create_child("String")?
            .set_value(Some(&"unicode ✓ ".repeat(index % 7)))?;
    }

    Ok(dc)
}

fn save(dc: &DataCenter, options: &SaveOptions) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    dc.save(&mut buffer, options)?;
    Ok(buffer)
}

fn all_load_options() -> Vec<LoadOptions> {
    let mut options = Vec::new();

    for strict in [false, true] {
        for mode in [LoaderMode::Transient, LoaderMode::Lazy, LoaderMode::Eager] {
            for mutability in [Mutability::Mutable, Mutability::Immutable] {
                if mode == LoaderMode::Transient && mutability == Mutability::Mutable {
                    continue;
                }
                options.push(
                    LoadOptions::builder()
                        .strict(strict)
                        .mode(mode)
                        .mutability(mutability)
                        .build(),
                );
            }
        }
    }

    options
}

#[traced_test]
#[test]
fn round_trip_in_every_mode() -> Result<()> {
    let original = build_sample()?;
    let input = save(&original, &SaveOptions::default())?;

    for options in all_load_options() {
        info!("loading with {:?}", options);

        let loaded = DataCenter::load(&input[..], &options)?;
        assert_eq!(loaded.mode(), options.mode);
        assert_eq!(loaded.is_immutable(), options.mutability == Mutability::Immutable);
        assert_eq!(loaded.root(), original.root());
    }

    Ok(())
}

#[test]
fn round_trip_every_format_variant() -> Result<()> {
    let original = build_sample()?;

    for architecture in [Architecture::X86, Architecture::X64] {
        for compression in [CompressionMethod::None, CompressionMethod::Zlib] {
            for revision in [100, 387463] {
                let options = SaveOptions::builder()
                    .architecture(architecture)
                    .compression(compression)
                    .revision(revision)
                    .build();
                let input = save(&original, &options)?;

                let loaded =
                    DataCenter::load(&input[..], &LoadOptions::builder().strict(true).build())?;
                assert_eq!(loaded.root(), original.root());
            }
        }
    }

    Ok(())
}

#[test]
fn scenario_single_child() -> Result<()> {
    let mut dc = DataCenter::create();
    let mut root = dc.root_mut();
    let mut a = root.create_child("A")?;
    a.add_attribute("x", 5)?;
    a.set_value(Some("hi"))?;

    let input = save(&dc, &SaveOptions::default())?;
    let loaded = DataCenter::load(&input[..], &LoadOptions::builder().strict(true).build())?;

    let root = loaded.root();
    assert_eq!(root.child_count(), 1);

    let a = root.child(0).unwrap();
    assert_eq!(a.name(), "A");
    assert_eq!(a.attribute("x"), Some(&DataCenterValue::Int(5)));
    assert_eq!(a.attribute_count(), 1);
    assert_eq!(a.value(), Some("hi"));

    Ok(())
}

#[test]
fn lazy_access_is_idempotent() -> Result<()> {
    let input = save(&build_sample()?, &SaveOptions::default())?;

    for mode in [LoaderMode::Lazy, LoaderMode::Transient] {
        let options = LoadOptions::builder()
            .mode(mode)
            .mutability(Mutability::Immutable)
            .build();
        let loaded = DataCenter::load(&input[..], &options)?;

        let root = loaded.root();
        let first = root.child(3).unwrap();
        let second = root.child(3).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first.attributes().collect::<Vec<_>>(),
            second.attributes().collect::<Vec<_>>()
        );
        assert_eq!(
            first.children().map(|c| c.value().map(str::to_owned)).collect::<Vec<_>>(),
            vec![Some("description text".to_owned())]
        );
        assert_eq!(first.parent().unwrap(), loaded.root());
    }

    Ok(())
}

#[test]
fn lazy_mutable_tree_can_be_edited() -> Result<()> {
    let input = save(&build_sample()?, &SaveOptions::default())?;
    let mut loaded = DataCenter::load(&input[..], &LoadOptions::default())?;

    let mut root = loaded.root_mut();
    let mut item = root.child_mut(0).unwrap();
    item.set_attribute("id", 1000)?;
    item.create_child("Extra")?.add_attribute("flag", true)?;
    assert!(root.remove_child(1)?);

    let root = loaded.root();
    assert_eq!(root.child_count(), 20);
    assert_eq!(root.child(0).unwrap().attribute("id"), Some(&DataCenterValue::Int(1000)));
    assert_eq!(
        root.child(1).unwrap().attribute("id"),
        Some(&DataCenterValue::Int(2))
    );

    let reloaded = DataCenter::load(&save(&loaded, &SaveOptions::default())?[..], &LoadOptions::default())?;
    assert_eq!(reloaded.root(), loaded.root());
    assert_eq!(reloaded.root().child(0).unwrap().child_count(), 2);

    Ok(())
}

#[test]
fn immutable_trees_reject_every_mutator() -> Result<()> {
    let input = save(&build_sample()?, &SaveOptions::default())?;

    for mode in [LoaderMode::Transient, LoaderMode::Lazy, LoaderMode::Eager] {
        let options = LoadOptions::builder()
            .mode(mode)
            .mutability(Mutability::Immutable)
            .build();
        let mut loaded = DataCenter::load(&input[..], &options)?;
        let reference = DataCenter::load(&input[..], &options)?;

        let mut root = loaded.root_mut();
        let mut item = root.child_mut(0).unwrap();

        let results = [
            item.set_value(Some("x")),
            item.set_keys(DataCenterKeys::none()),
            item.create_child("Child").map(|_| ()),
            item.remove_child(0).map(|_| ()),
            item.clear_children(),
            item.add_attribute("new", 1),
            item.set_attribute("id", 2),
            item.remove_attribute("id").map(|_| ()),
            item.clear_attributes(),
        ];

        for result in results {
            assert!(matches!(result, Err(Error::ImmutableNode)));
        }

        assert!(loaded.root().is_immutable());
        assert_eq!(loaded.root(), reference.root());
    }

    Ok(())
}

#[test]
fn wrong_key_is_rejected() -> Result<()> {
    let input = save(&build_sample()?, &SaveOptions::default())?;

    let options = LoadOptions::builder()
        .key(KeyPair::BUILD_100.key.to_vec())
        .iv(KeyPair::BUILD_100.iv.to_vec())
        .build();

    assert!(DataCenter::load(&input[..], &options).is_err());

    Ok(())
}

#[test]
fn custom_key_round_trip() -> Result<()> {
    let key = vec![0x42; 16];
    let iv = vec![0x24; 16];

    let original = build_sample()?;
    let input = save(
        &original,
        &SaveOptions::builder().key(key.clone()).iv(iv.clone()).build(),
    )?;

    let loaded = DataCenter::load(&input[..], &LoadOptions::builder().key(key).iv(iv).build())?;
    assert_eq!(loaded.root(), original.root());

    Ok(())
}

#[traced_test]
#[test]
fn custom_key_stays_out_of_logs() -> Result<()> {
    let key = vec![0x42; 16];
    let iv = vec![0x24; 16];

    let original = build_sample()?;
    let input = save(
        &original,
        &SaveOptions::builder().key(key.clone()).iv(iv.clone()).build(),
    )?;
    DataCenter::load(&input[..], &LoadOptions::builder().key(key).iv(iv).build())?;

    assert!(logs_contain("strict=false"));
    assert!(!logs_contain("66, 66"));
    assert!(!logs_contain("36, 36"));

    Ok(())
}

#[tokio::test]
async fn async_round_trip() -> Result<()> {
    let original = build_sample()?;

    let mut buffer = Vec::new();
    original
        .save_async(&mut buffer, &SaveOptions::default())
        .await?;

    let options = LoadOptions::builder().mode(LoaderMode::Eager).build();
    let loaded = DataCenter::load_async(&buffer[..], &options).await?;

    assert_eq!(loaded.root(), original.root());

    Ok(())
}
