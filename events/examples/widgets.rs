// Widgets listening to window resize events.
//
// Each widget is a host. Dropping a widget silences its listeners right away; its stale entry
// stays in the chain until the next attach on that chain sweeps it out.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use rusty_events::{Chain, Host, Registry};

struct Widget {
    name: &'static str,
    width: Arc<AtomicU32>,
    host: Host,
}

impl Widget {
    fn new(name: &'static str, registry: &Registry, on_resize: &mut Chain<(u32, u32)>) -> Self {
        let width = Arc::new(AtomicU32::new(0));
        let host = registry.host();
        let sink = width.clone();
        registry
            .attach(
                on_resize,
                move |w: u32, _h: u32| {
                    sink.store(w, Ordering::Relaxed);
                    println!("  {name} resized to {w}");
                },
                &host,
            )
            .expect("registry is initialized");
        Self { name, width, host }
    }

    fn width(&self) -> u32 {
        self.width.load(Ordering::Relaxed)
    }
}

fn main() {
    let registry = Registry::new();
    let mut on_resize = Chain::<(u32, u32)>::new();

    let sidebar = Widget::new("sidebar", &registry, &mut on_resize);
    let canvas = Widget::new("canvas", &registry, &mut on_resize);

    println!("resize 800x600:");
    let fired = on_resize.invoke((800, 600));
    println!("  {fired} listeners fired, chain has {} entries", on_resize.len());

    println!("closing {} (host {})", sidebar.name, sidebar.host.key());
    drop(sidebar);

    println!("resize 1024x768:");
    let fired = on_resize.invoke((1024, 768));
    println!("  {fired} listeners fired, chain has {} entries", on_resize.len());

    let toolbar = Widget::new("toolbar", &registry, &mut on_resize);
    println!("after opening {}: chain has {} entries", toolbar.name, on_resize.len());

    println!("resize 1280x720:");
    on_resize.invoke((1280, 720));
    println!(
        "canvas width {}, toolbar width {}",
        canvas.width(),
        toolbar.width()
    );
}
