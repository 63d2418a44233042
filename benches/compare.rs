use divan;
use sharedbox::SharedBox;
use std::rc::Rc;

fn main() {
    divan::main();
}

#[divan::bench]
fn sharedbox_new() {
    divan::black_box({
        let shared: SharedBox<_> = SharedBox::new(divan::black_box([0usize; 4]));
        shared
    });
}

#[divan::bench]
fn sharedbox_new_with_destroyer() {
    divan::black_box({
        let shared = SharedBox::new_with(divan::black_box([0usize; 4]), drop);
        shared
    });
}

#[divan::bench]
fn sharedbox_clone_drop(bencher: divan::Bencher) {
    let shared = SharedBox::new([0usize; 4]);
    bencher.bench_local(|| divan::black_box(shared.clone()));
}

#[divan::bench]
fn sharedbox_reset_to(bencher: divan::Bencher) {
    let mut shared = SharedBox::new([0usize; 4]);
    bencher.bench_local(|| SharedBox::reset_to(&mut shared, Box::new(divan::black_box([1usize; 4]))));
}

#[divan::bench]
fn rc_new() {
    divan::black_box({
        let rc: Rc<_> = Rc::new(divan::black_box([0usize; 4]));
        rc
    });
}

#[divan::bench]
fn rc_clone_drop(bencher: divan::Bencher) {
    let rc = Rc::new([0usize; 4]);
    bencher.bench_local(|| divan::black_box(rc.clone()));
}

#[divan::bench]
fn box_new() {
    divan::black_box({
        let boxed: Box<_> = Box::new(divan::black_box([0usize; 4]));
        boxed
    });
}
