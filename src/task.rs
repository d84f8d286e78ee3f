// 该文件是 Paizhao （拍照识物） 项目的一部分。
// src/task.rs - 拍摄、推理、渲染任务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use tracing::{error, info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 只处理第一帧。检测失败时不渲染结果，错误返回给调用者
pub struct OneShotTask;

impl<
  F: AsRef<M::Input>,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let result = match model.infer(frame.as_ref()) {
      Ok(result) => result,
      Err(e) => {
        error!("检测失败: {}", e);
        if let Err(render_err) = output.render_failure(&frame) {
          warn!("保存原始帧失败: {}", render_err);
        }
        return Err(e.into());
      }
    };
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 逐帧处理所有输入。单帧检测或保存失败只记录警告，继续下一帧
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 收到 Ctrl-C 后处理完当前帧即退出
  pub fn with_interrupt_handler(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }

  fn install_interrupt_handler(&self) -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    if self.handle_interrupt {
      let flag = interrupted.clone();
      if let Err(e) = ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        flag.store(true, Ordering::SeqCst);
      }) {
        warn!("无法设置 Ctrl-C 处理函数: {}", e);
      }
    }
    interrupted
  }
}

impl<
  F: AsRef<M::Input>,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let interrupted = self.install_interrupt_handler();

    let mut frame_index = 0usize;
    let mut failed = 0usize;
    for frame in input {
      frame_index += 1;
      info!("处理第 {} 帧图像", frame_index);
      let now = std::time::Instant::now();

      match model.infer(frame.as_ref()) {
        Ok(result) => {
          let elapsed = now.elapsed();
          if let Err(e) = output.render_result(&frame, &result) {
            warn!("第 {} 帧保存失败: {}", frame_index, e);
          }
          info!(
            "推理完成，耗时: {:.2?} / {:.2?}",
            elapsed,
            now.elapsed()
          );
        }
        Err(e) => {
          failed += 1;
          warn!("第 {} 帧检测失败: {}", frame_index, e);
          if let Err(e) = output.render_failure(&frame) {
            warn!("第 {} 帧保存失败: {}", frame_index, e);
          }
        }
      }

      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if interrupted.load(Ordering::SeqCst) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共 {} 帧，检测失败 {} 帧", frame_index, failed);
    Ok(())
  }
}
