use raster_texel::texels::U32;
use raster_texel::SharedBuffer;
use std::thread;

#[test]
fn detach_on_write_across_threads() {
    const LEN: usize = 128;
    let original = SharedBuffer::new(LEN * 4);

    // Every thread writes through its own handle; none of the writes may be visible elsewhere.
    thread::scope(|join| {
        for value in 1..=4u32 {
            let mut handle = original.clone();
            join.spawn(move || {
                let words = U32.try_to_slice_mut(handle.make_mut()).unwrap();
                words[..LEN].iter_mut().for_each(|w| *w = value);
                assert!(handle.is_unique());
                assert!(handle.as_texels(U32)[..LEN].iter().all(|&w| w == value));
            });
        }
    });

    assert!(original.is_unique());
    assert!(original.as_texels(U32)[..LEN].iter().all(|&w| w == 0));
}

#[test]
fn unique_handle_does_not_copy() {
    let mut buffer = SharedBuffer::new(8);
    let before = buffer.as_bytes().as_ptr();
    buffer.make_mut()[0] = 1;
    assert_eq!(before, buffer.as_bytes().as_ptr());

    let alias = buffer.clone();
    assert_eq!(alias.handle_count(), 2);
    buffer.make_mut()[0] = 2;
    assert_ne!(alias.as_bytes().as_ptr(), buffer.as_bytes().as_ptr());
    assert_eq!(alias.as_bytes()[0], 1);
}

#[test]
fn resized_copy_is_independent() {
    let buffer = SharedBuffer::from(&[7u8; 4][..]);
    let larger = buffer.to_resized(64);
    assert!(!larger.ptr_eq(&buffer));
    assert_eq!(&larger.as_bytes()[..4], &[7; 4]);
    assert!(larger.as_bytes().len() >= 64);
}
