//! 依赖图构建、拓扑排序和 pass 裁剪
//!
//! 分析 Pass 之间的资源依赖关系，构建 DAG 并进行拓扑排序。

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use crate::render_graph::RgImageHandle;

/// 依赖类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DependencyKind {
    /// 读取之前的写入结果，唯一携带数据的依赖
    ReadAfterWrite,
    /// 后一个写入必须在前一个写入之后
    WriteAfterWrite,
    /// 写入必须等待之前的读取完成
    WriteAfterRead,
}

/// 依赖边：从 producer 到 consumer
#[derive(Clone, Debug)]
pub struct DependencyEdge {
    /// 先执行的 Pass 索引
    pub producer: usize,
    /// 后执行的 Pass 索引
    pub consumer: usize,
    /// 依赖的图像
    pub image: RgImageHandle,
    pub kind: DependencyKind,
}

/// 依赖图
///
/// 表示 Pass 之间的依赖关系，用于拓扑排序、裁剪和执行顺序计算。
pub struct DependencyGraph {
    /// Pass 数量
    pass_count: usize,
    /// 邻接表（出边）
    adjacency: Vec<Vec<usize>>,
    /// 入度表
    in_degrees: Vec<usize>,
    /// 所有边
    edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// 创建新的依赖图
    pub fn new(pass_count: usize) -> Self {
        Self {
            pass_count,
            adjacency: vec![Vec::new(); pass_count],
            in_degrees: vec![0; pass_count],
            edges: Vec::new(),
        }
    }

    /// 添加依赖边
    pub fn add_edge(&mut self, producer: usize, consumer: usize, image: RgImageHandle, kind: DependencyKind) {
        // 避免重复边
        if !self.adjacency[producer].contains(&consumer) {
            self.adjacency[producer].push(consumer);
            self.in_degrees[consumer] += 1;
        }

        self.edges.push(DependencyEdge {
            producer,
            consumer,
            image,
            kind,
        });
    }

    /// 分析资源依赖，构建依赖图
    ///
    /// 以 pass 的声明顺序为“程序顺序”，规则：
    /// - 写后读（RAW）：reader 依赖最后一个 writer
    /// - 写后写（WAW）：后一个 writer 依赖前一个 writer
    /// - 读后写（WAR）：writer 依赖上次写入以来的所有 reader
    pub fn analyze(
        pass_count: usize,
        image_reads: &[Vec<RgImageHandle>],
        image_writes: &[Vec<RgImageHandle>],
    ) -> Self {
        let mut graph = Self::new(pass_count);

        // 跟踪每个资源的最后写入者
        let mut last_writer: HashMap<RgImageHandle, usize> = HashMap::new();
        // 跟踪每个资源在最后一次写入后的所有读取者
        let mut readers_since_write: HashMap<RgImageHandle, Vec<usize>> = HashMap::new();

        for pass_idx in 0..pass_count {
            for &image in &image_reads[pass_idx] {
                if let Some(&writer) = last_writer.get(&image) {
                    if writer != pass_idx {
                        graph.add_edge(writer, pass_idx, image, DependencyKind::ReadAfterWrite);
                    }
                }
                let readers = readers_since_write.entry(image).or_default();
                if !readers.contains(&pass_idx) {
                    readers.push(pass_idx);
                }
            }

            for &image in &image_writes[pass_idx] {
                if let Some(&prev_writer) = last_writer.get(&image) {
                    if prev_writer != pass_idx {
                        graph.add_edge(prev_writer, pass_idx, image, DependencyKind::WriteAfterWrite);
                    }
                }
                if let Some(readers) = readers_since_write.remove(&image) {
                    for reader in readers.into_iter().filter(|&r| r != pass_idx) {
                        graph.add_edge(reader, pass_idx, image, DependencyKind::WriteAfterRead);
                    }
                }

                last_writer.insert(image, pass_idx);
            }
        }

        graph
    }

    /// 执行拓扑排序
    ///
    /// 没有依赖约束的 pass 保持声明顺序。
    ///
    /// # 返回
    /// - `Ok(order)`: 拓扑排序后的 Pass 索引列表
    /// - `Err(cycle)`: 检测到循环依赖，返回参与循环的 Pass 索引
    pub fn topological_sort(&self) -> Result<Vec<usize>, Vec<usize>> {
        let mut in_degrees = self.in_degrees.clone();
        let mut ready = BinaryHeap::new();
        let mut result = Vec::with_capacity(self.pass_count);

        // 将所有入度为 0 的节点加入队列
        for (i, &degree) in in_degrees.iter().enumerate() {
            if degree == 0 {
                ready.push(Reverse(i));
            }
        }

        while let Some(Reverse(node)) = ready.pop() {
            result.push(node);

            for &neighbor in &self.adjacency[node] {
                in_degrees[neighbor] -= 1;
                if in_degrees[neighbor] == 0 {
                    ready.push(Reverse(neighbor));
                }
            }
        }

        if result.len() != self.pass_count {
            // 存在循环，找出参与循环的节点
            let remaining: Vec<usize> = (0..self.pass_count).filter(|&i| in_degrees[i] > 0).collect();
            Err(remaining)
        } else {
            Ok(result)
        }
    }

    /// 从根 pass 反向传播存活性
    ///
    /// 只沿 RAW 边传播：一个 pass 存活当且仅当它是根，
    /// 或者它写入的数据被某个存活的 pass 读取。
    pub fn live_passes(&self, roots: &[bool]) -> Vec<bool> {
        let mut live = roots.to_vec();
        let mut producers_of: Vec<Vec<usize>> = vec![Vec::new(); self.pass_count];
        for edge in self.edges.iter().filter(|e| e.kind == DependencyKind::ReadAfterWrite) {
            producers_of[edge.consumer].push(edge.producer);
        }

        let mut queue: VecDeque<usize> = (0..self.pass_count).filter(|&i| live[i]).collect();
        while let Some(node) = queue.pop_front() {
            for &producer in &producers_of[node] {
                if !live[producer] {
                    live[producer] = true;
                    queue.push_back(producer);
                }
            }
        }
        live
    }

    /// 获取 Pass 的直接依赖（前驱）
    pub fn get_predecessors(&self, pass_index: usize) -> Vec<usize> {
        let mut predecessors = HashSet::new();
        for edge in &self.edges {
            if edge.consumer == pass_index {
                predecessors.insert(edge.producer);
            }
        }
        let mut predecessors: Vec<usize> = predecessors.into_iter().collect();
        predecessors.sort_unstable();
        predecessors
    }

    /// 获取 Pass 的直接后继
    pub fn get_successors(&self, pass_index: usize) -> &[usize] {
        &self.adjacency[pass_index]
    }

    /// 获取所有边
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn images(n: usize) -> Vec<RgImageHandle> {
        let mut map: SlotMap<RgImageHandle, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn test_simple_dependency() {
        // Pass 0 写入 image 0
        // Pass 1 读取 image 0
        let img = images(1);
        let image_reads = vec![vec![], vec![img[0]]];
        let image_writes = vec![vec![img[0]], vec![]];

        let graph = DependencyGraph::analyze(2, &image_reads, &image_writes);

        let order = graph.topological_sort().unwrap();
        assert_eq!(order, vec![0, 1]);
        assert_eq!(graph.edges()[0].kind, DependencyKind::ReadAfterWrite);
    }

    #[test]
    fn test_chain_dependency() {
        // Pass 0 -> Pass 1 -> Pass 2
        let img = images(2);
        let image_reads = vec![vec![], vec![img[0]], vec![img[1]]];
        let image_writes = vec![vec![img[0]], vec![img[1]], vec![]];

        let graph = DependencyGraph::analyze(3, &image_reads, &image_writes);

        let order = graph.topological_sort().unwrap();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(graph.get_predecessors(2), vec![1]);
    }

    #[test]
    fn test_parallel_passes_keep_declaration_order() {
        // Pass 0 写入 image 0
        // Pass 1 写入 image 1（无依赖）
        // Pass 2 读取 image 0 和 image 1
        let img = images(2);
        let image_reads = vec![vec![], vec![], vec![img[0], img[1]]];
        let image_writes = vec![vec![img[0]], vec![img[1]], vec![]];

        let graph = DependencyGraph::analyze(3, &image_reads, &image_writes);

        assert_eq!(graph.topological_sort().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_write_after_read_orders_reader_first() {
        // Pass 0 读取 color，Pass 1 覆盖 color
        let img = images(1);
        let image_reads = vec![vec![img[0]], vec![]];
        let image_writes = vec![vec![], vec![img[0]]];

        let graph = DependencyGraph::analyze(2, &image_reads, &image_writes);

        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edges()[0].kind, DependencyKind::WriteAfterRead);
        assert_eq!(graph.topological_sort().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let img = images(1);
        let mut graph = DependencyGraph::new(2);
        graph.add_edge(0, 1, img[0], DependencyKind::ReadAfterWrite);
        graph.add_edge(1, 0, img[0], DependencyKind::ReadAfterWrite);

        assert_eq!(graph.topological_sort(), Err(vec![0, 1]));
    }

    #[test]
    fn test_liveness_follows_data_edges_only() {
        // 0 写 a；1 读 a 写 b；2 读 b（根）；3 写 c 但没人读
        let img = images(3);
        let image_reads = vec![vec![], vec![img[0]], vec![img[1]], vec![]];
        let image_writes = vec![vec![img[0]], vec![img[1]], vec![], vec![img[2]]];
        let graph = DependencyGraph::analyze(4, &image_reads, &image_writes);

        let live = graph.live_passes(&[false, false, true, false]);
        assert_eq!(live, vec![true, true, true, false]);
    }

    #[test]
    fn test_reader_is_not_kept_alive_by_later_writer() {
        // 0 读 a（没有输出）；1 写 a（根）
        let img = images(1);
        let image_reads = vec![vec![img[0]], vec![]];
        let image_writes = vec![vec![], vec![img[0]]];
        let graph = DependencyGraph::analyze(2, &image_reads, &image_writes);

        assert_eq!(graph.live_passes(&[false, true]), vec![false, true]);
    }
}
