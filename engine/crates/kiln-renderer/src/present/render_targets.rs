use ash::vk;
use kiln_gfx::{
    error::GfxResult,
    pipelines::framebuffer::GfxFramebuffer,
    resources::{
        image::{GfxImage, GfxImageCreateInfo, has_stencil},
        image_view::{GfxImageView, GfxImageViewDesc},
    },
};
use kiln_render_interface::pipeline_settings::DefaultRendererSettings;

use crate::present::render_passes::RenderPasses;

/// What gets allocated for one swapchain image.
#[derive(Clone, Copy, Debug)]
pub struct ImageTargetsDesc {
    pub image_index: usize,
    pub depth: GfxImageCreateInfo,
    pub viewport: GfxImageCreateInfo,
}

/// Every per-image target derives its size from the swapchain extent.
pub fn plan_image_targets(image_count: usize, extent: vk::Extent2D, depth_format: vk::Format) -> Vec<ImageTargetsDesc> {
    (0..image_count)
        .map(|image_index| ImageTargetsDesc {
            image_index,
            depth: GfxImageCreateInfo::new_image_2d_info(
                extent,
                depth_format,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            ),
            viewport: GfxImageCreateInfo::new_image_2d_info(
                extent,
                DefaultRendererSettings::VIEWPORT_FORMAT,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            ),
        })
        .collect()
}

fn depth_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    if has_stencil(format) {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else {
        vk::ImageAspectFlags::DEPTH
    }
}

/// A device object owned by one swapchain image's targets.
enum TargetObject {
    Image(GfxImage),
    View(GfxImageView),
    Framebuffer(GfxFramebuffer),
}
impl TargetObject {
    fn destroy(self) {
        match self {
            Self::Image(image) => image.destroy(),
            Self::View(view) => view.destroy(),
            Self::Framebuffer(framebuffer) => framebuffer.destroy(),
        }
    }
}

fn keep_image(objects: &mut Vec<TargetObject>, image: GfxImage) -> vk::Image {
    let handle = image.handle();
    objects.push(TargetObject::Image(image));
    handle
}

fn keep_view(objects: &mut Vec<TargetObject>, view: GfxImageView) -> vk::ImageView {
    let handle = view.handle();
    objects.push(TargetObject::View(view));
    handle
}

fn keep_framebuffer(objects: &mut Vec<TargetObject>, framebuffer: GfxFramebuffer) -> vk::Framebuffer {
    let handle = framebuffer.handle();
    objects.push(TargetObject::Framebuffer(framebuffer));
    handle
}

/// Destroys `objects` newest first. Returns how many were destroyed.
fn release_objects(objects: Vec<TargetObject>) -> usize {
    let mut destroyed = 0;
    for object in objects.into_iter().rev() {
        object.destroy();
        destroyed += 1;
    }
    destroyed
}

/// Runs `build` against an empty object list. If it fails, the objects it already created go to
/// `release` before the error is returned.
fn build_or_release<O, R>(
    build: impl FnOnce(&mut Vec<O>) -> GfxResult<R>,
    release: impl FnOnce(Vec<O>) -> usize,
) -> GfxResult<(R, Vec<O>)> {
    let mut objects = Vec::new();
    match build(&mut objects) {
        Ok(built) => Ok((built, objects)),
        Err(err) => {
            let released = release(objects);
            log::warn!("target creation failed after {} objects: {}", released, err);
            Err(err)
        }
    }
}

/// Something [`RenderTargets`] keeps per swapchain image.
pub trait PerImageTargets {
    /// device objects currently owned
    fn object_count(&self) -> usize;

    /// Returns how many objects were destroyed.
    fn destroy(self) -> usize;
}

struct TargetHandles {
    viewport_view: vk::ImageView,
    viewport_framebuffer: vk::Framebuffer,
    main_framebuffer: vk::Framebuffer,
    ui_framebuffer: vk::Framebuffer,
}

/// Targets bound to one swapchain image.
pub struct ImageTargets {
    extent: vk::Extent2D,
    handles: TargetHandles,
    /// in creation order
    objects: Vec<TargetObject>,
}
impl ImageTargets {
    fn new(
        desc: &ImageTargetsDesc,
        swapchain_image: vk::Image,
        swapchain_format: vk::Format,
        passes: &RenderPasses,
    ) -> GfxResult<Self> {
        let idx = desc.image_index;
        let extent = desc.viewport.extent;

        let (handles, objects) = build_or_release(
            |objects: &mut Vec<TargetObject>| {
                let swapchain_view = keep_view(
                    objects,
                    GfxImageView::new(
                        swapchain_image,
                        GfxImageViewDesc::new_2d(swapchain_format, vk::ImageAspectFlags::COLOR),
                        format!("swapchain-{idx}"),
                    )?,
                );
                let depth_image = keep_image(objects, GfxImage::new(&desc.depth, &format!("depth-{idx}"))?);
                let depth_view = keep_view(
                    objects,
                    GfxImageView::new(
                        depth_image,
                        GfxImageViewDesc::new_2d(desc.depth.format, depth_aspect(desc.depth.format)),
                        format!("depth-{idx}"),
                    )?,
                );
                let viewport_image = keep_image(objects, GfxImage::new(&desc.viewport, &format!("viewport-{idx}"))?);
                let viewport_view = keep_view(
                    objects,
                    GfxImageView::new(
                        viewport_image,
                        GfxImageViewDesc::new_2d(desc.viewport.format, vk::ImageAspectFlags::COLOR),
                        format!("viewport-{idx}"),
                    )?,
                );

                let viewport_framebuffer = keep_framebuffer(
                    objects,
                    GfxFramebuffer::new(
                        passes.viewport.handle(),
                        &[viewport_view, depth_view],
                        extent,
                        format!("viewport-{idx}"),
                    )?,
                );
                let main_framebuffer = keep_framebuffer(
                    objects,
                    GfxFramebuffer::new(passes.main.handle(), &[swapchain_view], extent, format!("main-{idx}"))?,
                );
                let ui_framebuffer = keep_framebuffer(
                    objects,
                    GfxFramebuffer::new(passes.ui.handle(), &[swapchain_view], extent, format!("ui-{idx}"))?,
                );
                Ok(TargetHandles {
                    viewport_view,
                    viewport_framebuffer,
                    main_framebuffer,
                    ui_framebuffer,
                })
            },
            release_objects,
        )?;

        Ok(Self {
            extent,
            handles,
            objects,
        })
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn viewport_view(&self) -> vk::ImageView {
        self.handles.viewport_view
    }

    #[inline]
    pub fn viewport_framebuffer(&self) -> vk::Framebuffer {
        self.handles.viewport_framebuffer
    }

    #[inline]
    pub fn main_framebuffer(&self) -> vk::Framebuffer {
        self.handles.main_framebuffer
    }

    #[inline]
    pub fn ui_framebuffer(&self) -> vk::Framebuffer {
        self.handles.ui_framebuffer
    }
}
impl PerImageTargets for ImageTargets {
    #[inline]
    fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn destroy(self) -> usize {
        release_objects(self.objects)
    }
}

/// Everything derived from one swapchain generation.
pub struct RenderTargets<T: PerImageTargets = ImageTargets> {
    images: Vec<T>,
    /// objects created by rebuilds and not yet destroyed by a teardown
    live_objects: usize,
}
impl<T: PerImageTargets> Default for RenderTargets<T> {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            live_objects: 0,
        }
    }
}

// new & init
impl RenderTargets<ImageTargets> {
    pub fn new(
        swapchain_images: &[vk::Image],
        swapchain_format: vk::Format,
        extent: vk::Extent2D,
        depth_format: vk::Format,
        passes: &RenderPasses,
    ) -> GfxResult<Self> {
        let mut targets = Self::default();
        targets.rebuild(swapchain_images, swapchain_format, extent, depth_format, passes)?;
        Ok(targets)
    }

    pub fn rebuild(
        &mut self,
        swapchain_images: &[vk::Image],
        swapchain_format: vk::Format,
        extent: vk::Extent2D,
        depth_format: vk::Format,
        passes: &RenderPasses,
    ) -> GfxResult<()> {
        let plan = plan_image_targets(swapchain_images.len(), extent, depth_format);
        self.rebuild_with(&plan, |desc| {
            ImageTargets::new(desc, swapchain_images[desc.image_index], swapchain_format, passes)
        })?;
        log::info!("render targets at {}x{}", extent.width, extent.height);
        Ok(())
    }
}
impl<T: PerImageTargets> RenderTargets<T> {
    /// Builds one `T` per entry of `plan`. On failure the targets built so far are kept, so a
    /// later [`Self::teardown`] still releases them.
    pub fn rebuild_with(
        &mut self,
        plan: &[ImageTargetsDesc],
        mut build: impl FnMut(&ImageTargetsDesc) -> GfxResult<T>,
    ) -> GfxResult<()> {
        let _span = tracy_client::span!("RenderTargets::rebuild");
        debug_assert!(self.images.is_empty(), "rebuild without teardown");

        for desc in plan {
            let targets = build(desc)?;
            self.live_objects += targets.object_count();
            self.images.push(targets);
        }
        log::info!("render targets: {} images, {} objects", self.images.len(), self.live_objects);
        Ok(())
    }
}
// getters
impl<T: PerImageTargets> RenderTargets<T> {
    #[inline]
    pub fn image(&self, image_index: usize) -> &T {
        &self.images[image_index]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    #[inline]
    pub fn live_objects(&self) -> usize {
        self.live_objects
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.images.iter()
    }
}
// destroy
impl<T: PerImageTargets> RenderTargets<T> {
    /// The device must be idle.
    pub fn teardown(&mut self) {
        let _span = tracy_client::span!("RenderTargets::teardown");
        let destroyed: usize = self.images.drain(..).map(T::destroy).sum();
        debug_assert_eq!(destroyed, self.live_objects, "teardown must destroy what rebuild created");
        log::info!("render targets: destroyed {} of {} objects", destroyed, self.live_objects);
        self.live_objects = self.live_objects.saturating_sub(destroyed);
    }
}
impl<T: PerImageTargets> Drop for RenderTargets<T> {
    fn drop(&mut self) {
        debug_assert!(self.images.is_empty(), "RenderTargets dropped without teardown()");
    }
}

#[cfg(test)]
mod tests {
    use kiln_gfx::error::GfxError;

    use super::*;

    #[test]
    fn test_every_target_matches_new_extent() {
        let old = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        let new = vk::Extent2D {
            width: 1917,
            height: 1003,
        };
        for extent in [old, new] {
            let plan = plan_image_targets(3, extent, vk::Format::D32_SFLOAT);
            assert_eq!(plan.len(), 3);
            for (i, desc) in plan.iter().enumerate() {
                assert_eq!(desc.image_index, i);
                assert_eq!(desc.depth.extent, extent);
                assert_eq!(desc.viewport.extent, extent);
            }
        }
    }

    #[test]
    fn test_target_usages() {
        let plan = plan_image_targets(1, vk::Extent2D { width: 4, height: 4 }, vk::Format::D24_UNORM_S8_UINT);
        let desc = &plan[0];
        assert_eq!(desc.depth.usage, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
        assert!(desc.viewport.usage.contains(vk::ImageUsageFlags::SAMPLED));
        assert!(desc.viewport.usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
        assert_eq!(desc.viewport.format, DefaultRendererSettings::VIEWPORT_FORMAT);
        assert_eq!(
            depth_aspect(desc.depth.format),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(depth_aspect(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
    }

    #[test]
    fn test_empty_targets_teardown_is_a_no_op() {
        tracy_client::Client::start();
        let mut targets = RenderTargets::<FakeTargets>::default();
        targets.teardown();
        assert!(targets.is_empty());
        assert_eq!(targets.live_objects(), 0);
    }

    /// Stands in for [`ImageTargets`]; owns `objects` device objects.
    struct FakeTargets {
        extent: vk::Extent2D,
        objects: usize,
    }
    impl PerImageTargets for FakeTargets {
        fn object_count(&self) -> usize {
            self.objects
        }

        fn destroy(self) -> usize {
            self.objects
        }
    }

    fn fake_targets(desc: &ImageTargetsDesc) -> GfxResult<FakeTargets> {
        Ok(FakeTargets {
            extent: desc.viewport.extent,
            objects: 8,
        })
    }

    #[test]
    fn test_rebuild_teardown_rebuild_tracks_live_objects() {
        tracy_client::Client::start();
        let first = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let second = vk::Extent2D {
            width: 1024,
            height: 300,
        };
        let mut targets = RenderTargets::<FakeTargets>::default();

        targets.rebuild_with(&plan_image_targets(3, first, vk::Format::D32_SFLOAT), fake_targets).unwrap();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets.live_objects(), 24);
        assert!(targets.iter().all(|t| t.extent == first));

        targets.teardown();
        assert!(targets.is_empty());
        assert_eq!(targets.live_objects(), 0);

        targets.rebuild_with(&plan_image_targets(2, second, vk::Format::D32_SFLOAT), fake_targets).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets.live_objects(), 16);
        assert_eq!(targets.image(1).extent, second);

        targets.teardown();
        assert_eq!(targets.live_objects(), 0);
    }

    #[test]
    fn test_failed_rebuild_keeps_built_targets_for_teardown() {
        tracy_client::Client::start();
        let extent = vk::Extent2D { width: 64, height: 64 };
        let mut targets = RenderTargets::<FakeTargets>::default();

        let result = targets.rebuild_with(&plan_image_targets(3, extent, vk::Format::D32_SFLOAT), |desc| {
            if desc.image_index == 2 {
                return Err(GfxError::Vk(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
            }
            fake_targets(desc)
        });
        assert!(result.is_err());
        assert_eq!(targets.len(), 2);
        assert_eq!(targets.live_objects(), 16);

        targets.teardown();
        assert!(targets.is_empty());
        assert_eq!(targets.live_objects(), 0);
    }

    #[test]
    fn test_partial_build_releases_created_objects() {
        let released = std::cell::RefCell::new(Vec::new());
        let result = build_or_release(
            |objects: &mut Vec<&str>| -> GfxResult<()> {
                objects.push("swapchain-view");
                objects.push("depth-image");
                Err(GfxError::Vk(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))
            },
            |objects| {
                let count = objects.len();
                released.borrow_mut().extend(objects.into_iter().rev());
                count
            },
        );
        assert!(matches!(result, Err(GfxError::Vk(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))));
        assert_eq!(*released.borrow(), vec!["depth-image", "swapchain-view"]);
    }

    #[test]
    fn test_complete_build_keeps_objects() {
        let (built, objects) = build_or_release(
            |objects: &mut Vec<u32>| -> GfxResult<u32> {
                objects.extend([1, 2, 3]);
                Ok(7)
            },
            |_| unreachable!("nothing to release on success"),
        )
        .unwrap();
        assert_eq!(built, 7);
        assert_eq!(objects, vec![1, 2, 3]);
    }
}
